use axum::{
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue,
    },
    response::IntoResponse,
};

static FAVICON: &[u8] = include_bytes!("../../../assets/favicon.ico");

pub async fn favicon() -> impl IntoResponse {
    (
        [
            (
                CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=favicon.ico"),
            ),
            (
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
        ],
        FAVICON,
    )
}

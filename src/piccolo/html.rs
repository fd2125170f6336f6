//! HTML fragments for the browsing pages, the login form and the admin console.
//!
//! Every interpolated value goes through [`escape`]; link targets go through [`href`].

use std::fmt::Write as _;

use crate::{
    settings::Settings,
    utils::{format_file_size, random_id, NO_CACHE_ID_LENGTH},
};

pub const MSG_BANNED: &str = "too many failed logins; try again later";
pub const MSG_NOT_FOUND: &str = "sorry, nothing found here";
pub const MSG_BROWSING_ERROR: &str = "directory browsing error, contact the system administrator";
pub const MSG_SETTINGS_ERROR: &str = "unable to save the settings, contact the system administrator";

const STYLE: &str = "body{font-family:Verdana,sans-serif;font-size:15px;line-height:1.5;margin:12px}\
h1{font-family:\"Segoe UI\",Arial,sans-serif;font-weight:400}\
table{border-collapse:collapse;width:100%;border:1px solid #ccc}\
tr{border-bottom:1px solid #ddd}tr:nth-child(even){background-color:#f1f1f1}\
td,th{padding:8px;text-align:left;vertical-align:top}\
.user{text-align:right}.admin{color:#f44336}.anonymous{color:#616161;font-style:italic}\
.warning{background-color:#f44336;color:#fff;padding:8px 16px}\
.login{max-width:320px;margin:10% auto;text-align:center}\
input[type=text],input[type=password],input[type=number]{padding:8px;width:100%;border:none;border-bottom:1px solid #ccc;background:#fdffdc}";

pub const FOOTER: &str = "\n</body>\n</html>\n";

/// Escape text for element content and quoted attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Percent-encode every segment of a logical path and append the anti-cache parameter.
#[must_use]
pub fn href(path: &str) -> String {
    let encoded = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let encoded = if encoded.is_empty() {
        "/".to_string()
    } else {
        encoded
    };
    format!("{encoded}?nocache={}", random_id(NO_CACHE_ID_LENGTH))
}

/// Page prologue. `user` is `Some((username, is_admin))` on pages showing who is logged in.
#[must_use]
pub fn header(title: &str, restart_needed: bool, user: Option<(&str, bool)>) -> String {
    let title = escape(title);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <link rel=\"icon\" href=\"/favicon.ico\" type=\"image/vnd.microsoft.icon\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    );

    if let Some((username, is_admin)) = user {
        let name = match (username.is_empty(), is_admin) {
            (true, _) => "<span class=\"anonymous\">anonymous</span>".to_string(),
            (false, true) => format!("<span class=\"admin\">{}</span>", escape(username)),
            (false, false) => escape(username),
        };
        let _ = writeln!(
            html,
            "<div class=\"user\">{name} - <a href=\"?login=spontaneous\" title=\"login\">change</a> \
             - <a href=\"/logout\">logout</a></div>"
        );
    }
    if restart_needed {
        html.push_str(
            "<p class=\"warning\"><b>WARNING</b>: piccolo needs a restart <b>now</b> to apply the new settings!</p>\n",
        );
    }
    let _ = writeln!(html, "<h1><small>{title}</small></h1>");
    html
}

/// Login form posting to `/login_action`; after a successful login the browser goes to
/// `redirect_url`.
#[must_use]
pub fn login_form(current_username: &str, redirect_url: &str) -> String {
    let current = if current_username.is_empty() {
        "<i>anonymous</i>".to_string()
    } else {
        escape(current_username)
    };
    format!(
        "<div class=\"login\">\n<h3>Login required</h3>\n\
         <form id=\"login_form\" action=\"/login_action\" method=\"post\">\n\
         <label for=\"username\">username</label>\n\
         <input id=\"username\" name=\"username\" type=\"text\" maxlength=\"64\" autofocus/>\n\
         <label for=\"password\">password</label>\n\
         <input id=\"password\" name=\"password\" type=\"password\" maxlength=\"256\"/>\n\
         <input id=\"redirect_url\" name=\"redirect_url\" type=\"hidden\" value=\"{}\"/>\n\
         <p><input type=\"submit\" value=\"Log in\"/></p>\n</form>\n\
         <p>(You are currently logged in as \"{current}\"<br/>and it is not enough.)</p>\n</div>\n",
        escape(redirect_url)
    )
}

/// Short waiting page that sends the browser to `target` after a few seconds.
#[must_use]
pub fn redirect_page(target: &str) -> String {
    let target = escape(target);
    format!(
        "<meta http-equiv=\"refresh\" content=\"3; url={target}\">\n\
         <p>Please wait a few seconds, or <a href=\"{target}\">continue</a>.</p>\n"
    )
}

/// One row of a directory listing.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub name: String,
    /// Logical path of the entry, used for the link.
    pub path: String,
    pub is_dir: bool,
    pub private: bool,
    pub size: u64,
    pub modified: Option<String>,
}

/// Directory table with the parent link and the summary line.
#[must_use]
pub fn listing(logical_path: &str, entries: &[ListingEntry]) -> String {
    let mut html = String::from("<table>\n<tr><th>name</th><th>size</th><th>time</th></tr>\n");

    if !logical_path.is_empty() {
        let parent = match logical_path.rfind('/') {
            Some(index) if index > 0 => &logical_path[..index],
            _ => "",
        };
        let _ = writeln!(
            html,
            "<tr><td title=\"open parent directory\"><a href=\"{}\"><b>&nbsp;..&nbsp;</b></a></td>\
             <td>-</td><td>-</td></tr>",
            escape(&href(parent))
        );
    }

    let (mut dirs, mut files, mut total) = (0usize, 0usize, 0u64);
    for entry in entries.iter().filter(|entry| entry.is_dir) {
        let private = if entry.private { " [PRIVATE]" } else { "" };
        let _ = writeln!(
            html,
            "<tr><td>[<a href=\"{}\">{}</a>]</td><td><small><i>directory{private}</i></small></td><td>{}</td></tr>",
            escape(&href(&entry.path)),
            escape(&entry.name),
            entry.modified.as_deref().unwrap_or("???")
        );
        dirs += 1;
    }
    for entry in entries.iter().filter(|entry| !entry.is_dir) {
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            escape(&href(&entry.path)),
            escape(&entry.name),
            format_file_size(entry.size),
            entry.modified.as_deref().unwrap_or("???")
        );
        files += 1;
        total += entry.size;
    }
    html.push_str("</table>\n");

    let _ = writeln!(
        html,
        "<p>{dirs} {}, {files} {}, total size: {}</p>",
        if dirs == 1 { "directory" } else { "directories" },
        if files == 1 { "file" } else { "files" },
        format_file_size(total)
    );
    html
}

fn param_row(label: &str, name: &str, value: &str, input_type: &str, help: &str) -> String {
    format!(
        "<tr><td>{label}</td><td><input id=\"{name}\" name=\"{name}\" type=\"{input_type}\" value=\"{}\"/></td><td>{help}</td></tr>\n",
        escape(value)
    )
}

/// Admin console body: general parameters, users and private directories.
#[must_use]
pub fn admin_console(settings: &Settings, admin_path: &str) -> String {
    let base = format!("/{admin_path}");
    let mut html = String::new();

    let _ = writeln!(
        html,
        "<h3>General parameters</h3>\n<form action=\"{base}/save_config\" method=\"post\">\n\
         <table>\n<tr><th>Parameter</th><th>Value</th><th>Help</th></tr>"
    );
    html.push_str(&param_row(
        "Root directory",
        "root_directory",
        settings.param("root_directory"),
        "text",
        "Root directory of all the published contents; absolute paths are preferred.",
    ));
    html.push_str(&param_row(
        "HTTP port",
        "http_port",
        settings.param("http_port"),
        "number",
        "HTTP port number (20 to 65535).",
    ));
    html.push_str(&param_row(
        "Admin path",
        "admin_path",
        settings.param("admin_path"),
        "text",
        "Web path of this page; letters, digits, <i>-</i> and <i>_</i> only.",
    ));
    html.push_str(&param_row(
        "List of admin users",
        "admin_users",
        settings.param("admin_users"),
        "text",
        "Users allowed on this page, separated by commas.",
    ));
    html.push_str("</table>\n<p><input type=\"submit\" value=\"Save\"/></p>\n</form>\n<hr/>\n");

    html.push_str(
        "<h3>Users</h3>\n<p>Passwords are chosen by administrators; users cannot change them.</p>\n\
         <table>\n<tr><th>username</th><th>actions</th><th>password hash (sha256)</th></tr>\n",
    );
    for (username, hash) in &settings.users {
        let username = escape(username);
        let _ = writeln!(
            html,
            "<tr><td>{username}</td><td>\
             <form action=\"{base}/change_password\" method=\"post\">\
             <input name=\"change_password_usr\" type=\"hidden\" value=\"{username}\"/>\
             <input name=\"change_password_pwd\" type=\"password\" minlength=\"5\" placeholder=\"new password\"/>\
             <input type=\"submit\" value=\"change password\"/></form>\
             <form action=\"{base}/delete_user\" method=\"post\" onsubmit=\"return confirm('Delete this user?')\">\
             <input name=\"delete_user_usr\" type=\"hidden\" value=\"{username}\"/>\
             <input type=\"submit\" value=\"delete\"/></form></td>\
             <td><small>{}</small></td></tr>",
            escape(hash)
        );
    }
    let _ = writeln!(
        html,
        "</table>\n<form action=\"{base}/new_user\" method=\"post\"><p>\
         <input name=\"new_user_usr\" type=\"text\" placeholder=\"username\"/>\
         <input name=\"new_user_pwd\" type=\"password\" minlength=\"5\" placeholder=\"password\"/>\
         <input type=\"submit\" value=\"Add user\"/></p></form>\n<hr/>"
    );

    html.push_str(
        "<h3>Private directories</h3>\n\
         <p>Only logged users can view private directory names. Only the allowed users can explore them.</p>\n\
         <table>\n<tr><th>directory</th><th>allowed user list</th><th>actions</th></tr>\n",
    );
    for (directory, userlist) in &settings.permissions {
        let directory = escape(directory);
        let _ = writeln!(
            html,
            "<tr><td>{directory}</td><td>\
             <form action=\"{base}/change_perm\" method=\"post\">\
             <input name=\"change_perm_path\" type=\"hidden\" value=\"{directory}\"/>\
             <input name=\"change_perm_userlist\" type=\"text\" value=\"{}\"/>\
             <input type=\"submit\" value=\"change users\"/></form></td><td>\
             <form action=\"{base}/delete_perm\" method=\"post\" onsubmit=\"return confirm('Delete this permission?')\">\
             <input name=\"delete_perm_path\" type=\"hidden\" value=\"{directory}\"/>\
             <input type=\"submit\" value=\"delete\"/></form></td></tr>",
            escape(userlist)
        );
    }
    let _ = writeln!(
        html,
        "</table>\n<p><a href=\"{}\">Add permission</a></p>",
        escape(&href(&format!("{base}/new_perm_form")))
    );
    let _ = writeln!(html, "<!-- piccolo version {} -->", env!("CARGO_PKG_VERSION"));
    html
}

/// Form creating a private directory: users as checkboxes, directories under root as radios.
#[must_use]
pub fn new_perm_form<'a>(
    users: impl IntoIterator<Item = &'a String>,
    directories: &[String],
    admin_path: &str,
) -> String {
    let base = format!("/{admin_path}");
    let mut html = format!(
        "<form action=\"{base}/new_perm\" method=\"post\">\n\
         <p>Select the users that will access the private directory:</p>\n\
         <table>\n<tr><th>configured user</th></tr>\n"
    );
    for (id, user) in users.into_iter().enumerate() {
        let user = escape(user);
        let _ = writeln!(
            html,
            "<tr><td><input type=\"checkbox\" id=\"usr_{id}\" name=\"new_perm_user\" value=\"{user}\"/>\
             <label for=\"usr_{id}\">{user}</label></td></tr>"
        );
    }
    html.push_str("</table>\n<p>Select the directory:</p>\n<table>\n<tr><th>available directories</th></tr>\n");
    for (id, directory) in directories.iter().enumerate() {
        let label = match directory.rfind('/') {
            Some(index) => format!(
                "<span style=\"color:#707070\">{}</span>{}",
                escape(&directory[..=index]),
                escape(&directory[index + 1..])
            ),
            None => escape(directory),
        };
        let _ = writeln!(
            html,
            "<tr><td><input type=\"radio\" id=\"dir_{id}\" name=\"new_perm_path\" value=\"/{}\"/>\
             &nbsp;<label for=\"dir_{id}\">{label}</label></td></tr>",
            escape(directory)
        );
    }
    let _ = writeln!(
        html,
        "</table>\n<p><a href=\"{}\">Cancel (go back)</a>&nbsp;&nbsp;<input type=\"submit\" value=\"Save\"/></p>\n</form>",
        escape(&href(&base))
    );
    html
}

/// Shown instead of the new permission form when the tree under root cannot be walked.
#[must_use]
pub fn new_perm_form_error(admin_path: &str) -> String {
    format!(
        "<p>ERROR: one or more directories under the root directory are not readable.\n\
         Reconfigure root directory and try again.</p>\n<p><a href=\"{}\">Go back to the settings</a></p>\n",
        escape(&href(&format!("/{admin_path}")))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn escape_special_characters() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn href_encodes_segments_and_adds_nocache() {
        let link = href("/my docs/a&b.txt");
        assert!(link.starts_with("/my%20docs/a%26b.txt?nocache="));
        assert_eq!(link.len(), "/my%20docs/a%26b.txt?nocache=".len() + NO_CACHE_ID_LENGTH);
        assert!(href("").starts_with("/?nocache="));
    }

    #[test]
    fn header_shows_user_and_restart_banner() {
        let html = header("Contents of /", true, Some(("", false)));
        assert!(html.contains("anonymous"));
        assert!(html.contains("needs a restart"));

        let html = header("t", false, Some(("alice", true)));
        assert!(html.contains("<span class=\"admin\">alice</span>"));
        assert!(!html.contains("needs a restart"));

        let html = header("<script>", false, None);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("class=\"user\""));
    }

    #[test]
    fn login_form_carries_redirect_url() {
        let html = login_form("carol", "/private/sub");
        assert!(html.contains("value=\"/private/sub\""));
        assert!(html.contains("action=\"/login_action\""));
        assert!(html.contains("\"carol\""));
        assert!(login_form("", "/").contains("<i>anonymous</i>"));
    }

    #[test]
    fn listing_orders_and_counts() {
        let entries = vec![
            ListingEntry {
                name: "b.txt".to_string(),
                path: "/docs/b.txt".to_string(),
                is_dir: false,
                private: false,
                size: 10,
                modified: None,
            },
            ListingEntry {
                name: "private".to_string(),
                path: "/docs/private".to_string(),
                is_dir: true,
                private: true,
                size: 0,
                modified: Some("2024-01-01 00:00:00".to_string()),
            },
        ];
        let html = listing("/docs", &entries);
        assert!(html.contains("&nbsp;..&nbsp;"));
        assert!(html.contains("[PRIVATE]"));
        assert!(html.find("private").unwrap_or(usize::MAX) < html.find("b.txt").unwrap_or(0));
        assert!(html.contains("1 directory, 1 file, total size: 10 bytes"));

        let root = listing("", &[]);
        assert!(!root.contains("&nbsp;..&nbsp;"));
        assert!(root.contains("0 directories, 0 files"));
    }

    #[test]
    fn admin_console_escapes_values() {
        let mut settings = Settings::initial("alice", "hash", Path::new("/srv"), 8080);
        settings
            .users
            .insert("<bob>".to_string(), "h2".to_string());
        settings
            .permissions
            .insert("/private".to_string(), "alice,<bob>".to_string());
        let html = admin_console(&settings, "admin");
        assert!(html.contains("action=\"/admin/save_config\""));
        assert!(html.contains("&lt;bob&gt;"));
        assert!(!html.contains("<bob>"));
        assert!(html.contains("value=\"/private\""));
    }

    #[test]
    fn new_perm_form_lists_users_and_directories() {
        let users = ["alice".to_string(), "bob".to_string()];
        let directories = vec!["docs".to_string(), "docs/inner".to_string()];
        let html = new_perm_form(users.iter(), &directories, "admin");
        assert!(html.contains("name=\"new_perm_user\" value=\"bob\""));
        assert!(html.contains("value=\"/docs/inner\""));
        assert!(html.contains("action=\"/admin/new_perm\""));
    }
}

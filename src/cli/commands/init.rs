use clap::{Arg, Command};

pub const CMD_INIT: &str = "init";
pub const ARG_ADMIN_USER: &str = "admin-user";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_ROOT: &str = "root";
pub const ARG_HTTP_PORT: &str = "http-port";

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_INIT)
        .about("Create the configuration directory with a first administrator")
        .arg(
            Arg::new(ARG_ADMIN_USER)
                .long(ARG_ADMIN_USER)
                .help("Name of the first administrator")
                .env("PICCOLO_ADMIN_USER")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password of the first administrator, at least 5 characters")
                .env("PICCOLO_ADMIN_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ROOT)
                .long(ARG_ROOT)
                .help("Existing directory to publish")
                .env("PICCOLO_ROOT")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HTTP_PORT)
                .long(ARG_HTTP_PORT)
                .help("HTTP port stored in params.json")
                .default_value("8080")
                .value_parser(clap::value_parser!(u16).range(20..)),
        )
}

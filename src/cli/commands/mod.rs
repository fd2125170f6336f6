pub mod init;
pub mod logging;
pub mod tuning;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_CONFIG_DIR: &str = "config-dir";
pub const ARG_PORT: &str = "port";

pub const DEFAULT_CONFIG_DIR: &str = "settings";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("piccolo")
        .about("Small personal web file server")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_CONFIG_DIR)
                .short('c')
                .long("config-dir")
                .help("Directory holding params.json, users.json and permissions.json")
                .env("PICCOLO_CONFIG_DIR")
                .default_value(DEFAULT_CONFIG_DIR)
                .global(true),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on, overrides http_port from params.json")
                .env("PICCOLO_PORT")
                .value_parser(clap::value_parser!(u16).range(20..)),
        )
        .subcommand(init::command())
        .subcommand(Command::new("license").about("Show the license terms and exit"));

    let command = tuning::with_args(command);
    logging::with_args(command)
}

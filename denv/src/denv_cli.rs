/// Command-line parser for denv.

use clap::{App, Arg, AppSettings, SubCommand};

fn password_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(Arg::with_name("password").value_name("PASSWORD")
            .help("Tries PASSWORD on encrypted layers.  Can be given \
                   multiple times.")
            .long("password")
            .short("p")
            .takes_value(true)
            .number_of_values(1)
            .multiple(true))
        .arg(Arg::with_name("password-file").value_name("FILE")
             .help("Reads passwords from FILE, one per line.")
             .long("password-file")
             .takes_value(true))
        .arg(Arg::with_name("input").value_name("INPUT")
             .help("Reads from INPUT instead of stdin."))
}

// The argument parser.
pub fn build() -> App<'static, 'static> {
    let app = App::new("denv")
        .version(env!("CARGO_PKG_VERSION"))
        .about("denv takes PGP messages apart.")
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::ArgsNegateSubcommands)
        .arg(Arg::with_name("verbose")
             .help("Logs more.  Can be given multiple times.")
             .long("verbose")
             .short("v")
             .multiple(true)
             .global(true))
        .arg(Arg::with_name("output").value_name("FILE")
             .help("Writes to FILE instead of stdout.")
             .long("output")
             .short("o")
             .takes_value(true));

    password_args(app)
        .subcommand(password_args(
            SubCommand::with_name("inspect")
                .about("Lists the layers of a message and what they \
                        contain.")))
}

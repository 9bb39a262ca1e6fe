/// Takes PGP messages apart.
///
/// `denv` removes every layer of a message (encryption, compression,
/// signing) and writes the data.  `denv inspect` lists the layers
/// instead.
use std::fs::{self, File};
use std::io::{self, Read, Write};

use anyhow::Context;
use clap::ArgMatches;

use sequoia_envelope as envelope;
use envelope::{Config, ContentListItem, EnvInfo, Message};
use envelope::crypto::Password;
use envelope::message::open_with;

mod denv_cli;

type Result<T> = anyhow::Result<T>;

fn read_input(f: Option<&str>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    match f {
        Some(f) if f != "-" => {
            File::open(f).context("Failed to open input file")?
                .read_to_end(&mut data)?;
        }
        _ => {
            io::stdin().read_to_end(&mut data)
                .context("Failed to read stdin")?;
        }
    }
    Ok(data)
}

fn write_output(f: Option<&str>, data: &[u8]) -> Result<()> {
    match f {
        Some(f) if f != "-" =>
            fs::write(f, data).context("Failed to write output file")?,
        _ => {
            let mut stdout = io::stdout();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn passwords(m: &ArgMatches) -> Result<Vec<Password>> {
    let mut passwords: Vec<Password> = m.values_of("password")
        .map(|v| v.map(|p| Password::from(p)).collect())
        .unwrap_or_default();
    if let Some(f) = m.value_of("password-file") {
        let content = fs::read_to_string(f)
            .with_context(|| format!("Failed to read passwords from {}", f))?;
        passwords.extend(content.lines()
                         .filter(|l| ! l.is_empty())
                         .map(Password::from));
    }
    Ok(passwords)
}

// Opens the message, prompting for a password if an encrypted layer
// needs one and none were given.
fn open(m: &ArgMatches) -> Result<Message> {
    let data = read_input(m.value_of("input"))?;
    let mut passwords = passwords(m)?;
    let config = Config::from_env()?;

    open_with(&data, &config, |items: &[ContentListItem]| {
        if passwords.is_empty() {
            log::info!("{} password protected session keys",
                       items.iter()
                       .filter(|i| i.env_info() == EnvInfo::Password)
                       .count());
            match rpassword::read_password_from_tty(
                Some("Enter password to decrypt message: "))
            {
                Ok(p) if ! p.is_empty() => passwords.push(p.into()),
                Ok(_) => (),
                Err(err) => eprintln!("While reading password: {}", err),
            }
        }
        Ok(passwords.clone())
    })
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

fn describe(item: &ContentListItem) -> String {
    let mut s = format!("v{} {}", item.version(), item.env_info());
    if ! item.key_id().is_empty() {
        s.push_str(&format!(", key ID {}", hex(item.key_id())));
    }
    if let Some(encr) = item.encr_info() {
        s.push_str(&format!(", {} {}", encr.crypt_algo, encr.crypt_mode));
        if let Some(algo) = encr.key_setup_algo {
            s.push_str(&format!(", key setup with {}, {} iterations",
                                algo, encr.key_setup_iterations));
        }
        if item.payload().is_some() {
            s.push_str(", encrypted session key");
        }
    }
    if let Some(sig) = item.sig_info() {
        s.push_str(&format!(", type {:#04x}, {}", sig.sig_type,
                            sig.hash_algo));
        if let Some(algo) = sig.pk_algo {
            s.push_str(&format!(", {}", algo));
        }
        match &sig.digest {
            Some(d) => s.push_str(&format!(", digest {}{}", hex(d),
                                           if sig.hash_check_ok { "" }
                                           else { " (quick check failed)" })),
            None => s.push_str(", not hashed"),
        }
    }
    s
}

fn inspect(m: &ArgMatches) -> Result<()> {
    let message = open(m)?;
    for (n, layer) in message.layers().iter().enumerate() {
        println!("Layer {}: {:?}, PGP {}, contains {}",
                 n, layer.usage, layer.version, layer.content_type);
        for item in &layer.content_list {
            println!("  - {}", describe(item));
        }
    }
    println!("{} bytes of data", message.payload().len());
    Ok(())
}

fn main() -> Result<()> {
    let matches = denv_cli::build().get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level))
        .init();

    match matches.subcommand() {
        ("inspect", Some(m)) => inspect(m),
        _ => {
            let message = open(&matches)?;
            write_output(matches.value_of("output"), message.payload())
        }
    }
}

mod cli;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use obexftp::discovery::{self, AdapterHint, ServiceClass};
use obexftp::transport::make_transport;
use obexftp::{Event, EventSink, Session, path};

use cli::{Cli, Commands};

/// Prints session progress the way the classic tool did, with a spinner
/// while a transfer is running.
#[derive(Default)]
struct Console {
    bar: Option<ProgressBar>,
}

impl Console {
    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn start_bar(&mut self, message: String) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}").unwrap());
        bar.set_message(message);
        self.bar = Some(bar);
    }
}

impl EventSink for Console {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Connecting => eprintln!("Connecting..."),
            Event::Disconnecting => eprintln!("Disconnecting..."),
            Event::Ok(_) => {
                self.finish_bar();
                eprintln!("done");
            }
            Event::Err(tag) => {
                self.finish_bar();
                eprintln!("failed: {tag}");
            }
            Event::Sending(name) => self.start_bar(format!("Sending {name}...")),
            Event::Receiving(name) => self.start_bar(format!("Receiving {name}...")),
            Event::Progress => {
                if let Some(bar) = &self.bar {
                    bar.tick();
                }
            }
            Event::Body(_) => {}
            Event::Info(value) => println!("info: {value}"),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    // Discovery commands run without a session.
    match &cli.command {
        Commands::Scan => {
            let hint = AdapterHint::parse(cli.src.as_deref());
            for device in discovery::inquiry(&hint)? {
                println!("{}\t{}", device.address, device.name);
            }
            return Ok(());
        }
        Commands::Browse { addr } => {
            match discovery::browse_channel(*addr, ServiceClass::FileTransfer)? {
                Some(channel) => println!("{channel}"),
                None => return Err("no OBEX file-transfer service on the device".into()),
            }
            return Ok(());
        }
        _ => {}
    }

    let config = cli.make_transport_config()?;
    let transport = make_transport(&config, Duration::from_secs(cli.timeout.into()))?;
    let mut session = Session::open(transport, Box::new(Console::default()));

    session.connect()?;
    let result = run_command(&mut session, &cli.command);
    let _ = session.disconnect();
    session.close()?;
    result
}

fn run_command(session: &mut Session, command: &Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::List { folder } => {
            let buf = session.fast_list(folder.as_deref().unwrap_or(""))?;
            let text = buf.strip_suffix(&[0]).unwrap_or(buf);
            println!("{}", String::from_utf8_lossy(text));
        }
        Commands::Get { remote, local } => {
            let local = local
                .clone()
                .unwrap_or_else(|| PathBuf::from(path::basename(remote)));
            session.get(Some(&local), remote)?;
        }
        Commands::Put { paths } => {
            for path in paths {
                session.put(path)?;
            }
        }
        Commands::Delete { name } => session.del(name)?,
        Commands::Move { src, dst } => session.rename(src, dst)?,
        Commands::Info => {
            session.info(obexftp::INFO_MEMORY_USED)?;
            session.info(obexftp::INFO_MEMORY_FREE)?;
        }
        Commands::Scan | Commands::Browse { .. } => unreachable!("handled before connecting"),
    }
    Ok(())
}

mod cli;
mod config;
mod daemon;
mod error;
mod kernel;
mod logger;
mod mail;
mod registry;
mod signal_station;
mod supervisor;
mod worker;

use clap::Parser;

use cli::Args;
use kernel::NotificationInstance;
use registry::{WatchDescription, WatchRegistry};

fn main() {
    let args = Args::parse();

    if let Err(e) = logger::init(args.effective_logfile().as_deref(), args.verbose) {
        eprintln!("gidget: {e}");
        std::process::exit(1);
    }
    if args.syslog.is_some() {
        logger::mirror_to_syslog();
    }

    let watches = match config::load(&args.config) {
        Ok(watches) => watches,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let kernel = match NotificationInstance::open() {
        Ok(kernel) => kernel,
        Err(e) => {
            log::error!("{}", error::EngineError::KernelInit(e));
            std::process::exit(1);
        }
    };

    let mut registry = WatchRegistry::new();
    let mut next_watch_id = 1u32;
    for parsed in watches {
        match kernel.install(&parsed.path, parsed.event_mask) {
            Ok(wd) => {
                registry.insert(
                    wd,
                    WatchDescription {
                        path: parsed.path,
                        event_mask: parsed.event_mask,
                        command: parsed.command,
                        user: parsed.user,
                        mail_recipient: parsed.mail_recipient,
                        watch_id: next_watch_id,
                    },
                );
                next_watch_id += 1;
            }
            Err(e) => log::error!("unable to install watch on {:?}: {e}", parsed.path),
        }
    }

    if registry.is_empty() {
        log::warn!("no watches configured, running with nothing to do");
    }
    if !registry.is_densely_sequential() {
        log::debug!("registry watch ids are not densely sequential");
    }

    if let Err(e) = signal_station::install() {
        log::error!("{}", error::EngineError::SignalInstall(e));
        std::process::exit(1);
    }

    if args.daemon {
        if let Err(e) = daemon::daemonize() {
            log::error!("{e}");
            std::process::exit(1);
        }
        if let Err(e) = daemon::write_pidfile(&args.pidfile) {
            log::error!("{e}");
            std::process::exit(1);
        }
    }

    log::info!("gidget starting, {} watches installed", registry.len());
    supervisor::run(kernel, registry);
}

//! ttymirror-view: inspect a mirrored terminal session
//!
//! Attaches to the shared segment of a running ttymirror session,
//! identified by the captured terminal's device path, and prints the
//! mirrored screen as plain text. With --follow it reprints on every
//! update notice; with --send it injects input into the captured
//! program instead.

use std::process;

use anyhow::Context;
use log::error;

use ttymirror::channel::{MessageChannel, MessageKind};
use ttymirror::key::SessionKey;
use ttymirror::segment::ScreenSegment;

fn usage() -> ! {
    eprintln!("Usage: ttymirror-view [--follow] <pty-path>");
    eprintln!("       ttymirror-view --send TEXT <pty-path>");
    eprintln!();
    eprintln!("  <pty-path>   terminal device of the captured session, e.g. /dev/pts/5");
    eprintln!("  --follow     keep printing the screen on every update");
    eprintln!("  --send TEXT  inject TEXT as input into the captured program");
    process::exit(2);
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Error)
        .init();

    let mut follow = false;
    let mut send: Option<String> = None;
    let mut path: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--follow" | "-f" => follow = true,
            "--send" | "-s" => match args.next() {
                Some(text) => send = Some(text),
                None => usage(),
            },
            "--help" | "-h" => usage(),
            _ if path.is_none() => path = Some(arg),
            _ => usage(),
        }
    }

    let path = match path {
        Some(path) => path,
        None => usage(),
    };
    if follow && send.is_some() {
        usage();
    }

    if let Err(e) = run(&path, follow, send) {
        error!("{:#}", e);
        eprintln!("ttymirror-view: {:#}", e);
        process::exit(1);
    }
}

fn run(path: &str, follow: bool, send: Option<String>) -> anyhow::Result<()> {
    let key = SessionKey::from_pty_path(path)?;

    if let Some(text) = send {
        let channel = MessageChannel::attach(&key)
            .with_context(|| format!("no capture session found for {}", path))?;
        channel.send(MessageKind::Input, text.as_bytes())?;
        println!("Sent {} bytes to {}", text.len(), path);
        return Ok(());
    }

    let segment = ScreenSegment::attach(&key)
        .with_context(|| format!("no capture session found for {}", path))?;
    print_screen(&segment);

    if follow {
        let mut channel = MessageChannel::attach(&key)
            .with_context(|| format!("no capture session found for {}", path))?;
        channel.register_receiver(MessageKind::Updated, move |_| {
            println!();
            print_screen(&segment);
        })?;
        // The receiver thread does the work from here on.
        loop {
            std::thread::park();
        }
    }

    Ok(())
}

fn print_screen(segment: &ScreenSegment) {
    let (row, column) = segment.cursor();
    println!(
        "{}x{}, cursor at row {} column {}",
        segment.columns(),
        segment.rows(),
        row,
        column
    );
    for r in 0..segment.rows() {
        println!("{}", segment.row_text(r).trim_end());
    }
}

//! Command-line surface of the `execns` binary.

use clap::{crate_version, App, Arg, ArgMatches};
use nix::sched::CloneFlags;

use crate::error::Result;
use crate::namespace::NsKind;
use crate::request::Request;

const NS_FLAGS: [(&str, &str, NsKind); 5] = [
    ("mnt", "m", NsKind::Mnt),
    ("pid", "p", NsKind::Pid),
    ("uts", "u", NsKind::Uts),
    ("net", "n", NsKind::Net),
    ("ipc", "i", NsKind::Ipc),
];

pub fn app<'a, 'b>() -> App<'a, 'b> {
    let mut app = App::new("execns")
        .version(crate_version!())
        .about("Run a shell command inside the namespaces of another process")
        .arg(
            Arg::with_name("target")
                .help("PID of the process whose namespaces are joined")
                .short("t")
                .long("target")
                .required(true)
                .takes_value(true)
                .value_name("PID"),
        )
        .arg(
            Arg::with_name("command")
                .help("command run through /bin/sh -c")
                .short("c")
                .long("command")
                .required(true)
                .takes_value(true)
                .allow_hyphen_values(true)
                .value_name("CMD"),
        )
        .arg(
            Arg::with_name("env")
                .help("clone the target's environment")
                .short("e")
                .long("env"),
        )
        .arg(
            Arg::with_name("stop")
                .help("stop with SIGSTOP before any setup, until SIGCONT")
                .short("s")
                .long("stop"),
        )
        .arg(
            Arg::with_name("verbose")
                .help("verbose operation")
                .short("v")
                .long("verbose"),
        );

    for (name, short, kind) in NS_FLAGS.iter() {
        app = app.arg(
            Arg::with_name(*name)
                .help(ns_help(*kind))
                .short(*short)
                .long(*name),
        );
    }
    app
}

fn ns_help(kind: NsKind) -> &'static str {
    match kind {
        NsKind::Mnt => "join mount namespace",
        NsKind::Pid => "join PID namespace",
        NsKind::Uts => "join UTS namespace",
        NsKind::Net => "join network namespace",
        NsKind::Ipc => "join IPC namespace",
    }
}

/// Builds a validated request from parsed arguments.
pub fn request_from(matches: &ArgMatches<'_>) -> Result<Request> {
    let target = matches.value_of("target").unwrap_or_default();
    let command = matches.value_of("command").unwrap_or_default();
    let mut request = Request::new(target, command)?;

    let mut flags = CloneFlags::empty();
    for (name, _, kind) in NS_FLAGS.iter() {
        if matches.is_present(*name) {
            flags.set(kind.clone_flag(), true);
        }
    }
    request.namespaces = flags;
    request.clone_env = matches.is_present("env");
    request.suspend = matches.is_present("stop");
    Ok(request)
}

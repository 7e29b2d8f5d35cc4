//! Argument building for the `ssh` and `scp` clients.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;

use crate::transport::TransportError;

use super::SshConfig;

/// Renders `args` as one remote shell command, prefixed by an `export` for
/// every environment variable.
///
/// Each argument and value is shell-escaped, so the remote shell sees the
/// exact argument vector.
///
/// # Errors
///
/// Returns [`TransportError::ExecutionStartFailure`] when `args` is empty or
/// a variable name is not a valid shell identifier.
pub fn render_remote_command(
    args: &[String],
    env: &BTreeMap<String, String>,
) -> Result<String, TransportError> {
    if args.is_empty() {
        return Err(TransportError::ExecutionStartFailure {
            message: String::from("command vector is empty"),
        });
    }

    let mut rendered = String::new();
    for (key, value) in env {
        if !is_identifier(key) {
            return Err(TransportError::ExecutionStartFailure {
                message: format!("invalid environment variable name `{key}`"),
            });
        }
        rendered.push_str("export ");
        rendered.push_str(key);
        rendered.push('=');
        rendered.push_str(&escape(Cow::Borrowed(value.as_str())));
        rendered.push_str("; ");
    }

    let escaped: Vec<Cow<'_, str>> = args
        .iter()
        .map(|arg| escape(Cow::Borrowed(arg.as_str())))
        .collect();
    rendered.push_str(&escaped.join(" "));
    Ok(rendered)
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|rest| rest == '_' || rest.is_ascii_alphanumeric())
}

/// Where an SSH client connects and how it authenticates.
#[derive(Clone, Copy, Debug)]
pub struct Destination<'a> {
    /// Node address.
    pub address: IpAddr,
    /// Remote login.
    pub user: &'a str,
    /// Private key, if any.
    pub key: Option<&'a Utf8Path>,
}

/// Builds the `ssh` argument vector for running `remote_command`.
#[must_use]
pub fn ssh_args(
    config: &SshConfig,
    destination: Destination<'_>,
    tty: bool,
    remote_command: &str,
) -> Vec<OsString> {
    let mut args = Vec::new();
    if tty {
        args.push(OsString::from("-tt"));
    }
    args.extend([
        OsString::from("-p"),
        OsString::from(config.port.to_string()),
    ]);
    args.extend(common_options(config, destination.key));
    args.push(OsString::from(format!(
        "{}@{}",
        destination.user, destination.address
    )));
    args.push(OsString::from(remote_command));
    args
}

/// Builds the `scp` argument vector copying `local_path` to `remote_path`.
#[must_use]
pub fn scp_args(
    config: &SshConfig,
    destination: Destination<'_>,
    local_path: &Utf8Path,
    remote_path: &Utf8Path,
) -> Vec<OsString> {
    let host = match destination.address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    let mut args = vec![
        OsString::from("-P"),
        OsString::from(config.port.to_string()),
    ];
    args.extend(common_options(config, destination.key));
    args.push(OsString::from(local_path.as_str()));
    args.push(OsString::from(format!(
        "{}@{host}:{remote_path}",
        destination.user
    )));
    args
}

fn common_options(config: &SshConfig, key: Option<&Utf8Path>) -> Vec<OsString> {
    let mut args = Vec::new();

    if let Some(identity_file) = key {
        args.push(OsString::from("-i"));
        args.push(OsString::from(expand_home(identity_file).into_string()));
    }

    if config.batch_mode {
        args.push(OsString::from("-o"));
        args.push(OsString::from("BatchMode=yes"));
    }

    if !config.strict_host_key_checking {
        args.push(OsString::from("-o"));
        args.push(OsString::from("StrictHostKeyChecking=no"));
    }

    if !config.known_hosts_file.trim().is_empty() {
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "UserKnownHostsFile={}",
            config.known_hosts_file
        )));
    }

    args
}

/// Replaces a leading `~/` with `$HOME`. Paths are returned unchanged when
/// `HOME` is unset.
#[must_use]
pub fn expand_home(path: &Utf8Path) -> Utf8PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = std::env::var_os("HOME")
    {
        return Utf8PathBuf::from(home.to_string_lossy().into_owned()).join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[fixture]
    fn destination() -> Destination<'static> {
        Destination {
            address: "10.0.0.7".parse().expect("address"),
            user: "core",
            key: Some(Utf8Path::new("/keys/cluster")),
        }
    }

    #[rstest]
    fn plain_arguments_are_left_readable() {
        let rendered =
            render_remote_command(&[String::from("systemctl"), String::from("status")], &BTreeMap::new())
                .expect("render");

        assert_eq!(rendered, "systemctl status");
    }

    #[rstest]
    fn arguments_and_values_are_escaped() {
        let env = BTreeMap::from([
            (String::from("B"), String::from("two words")),
            (String::from("A"), String::from("1")),
        ]);
        let args = vec![
            String::from("echo"),
            String::from("$HOME"),
            String::from("it's"),
        ];

        let rendered = render_remote_command(&args, &env).expect("render");

        assert_eq!(
            rendered,
            "export A=1; export B='two words'; echo '$HOME' 'it'\\''s'"
        );
    }

    #[rstest]
    #[case("1ABC")]
    #[case("A-B")]
    #[case("")]
    #[case("A;rm")]
    fn invalid_variable_names_are_rejected(#[case] key: &str) {
        let env = BTreeMap::from([(key.to_owned(), String::from("x"))]);

        let err = render_remote_command(&[String::from("true")], &env).expect_err("invalid key");

        assert!(matches!(err, TransportError::ExecutionStartFailure { .. }));
    }

    #[rstest]
    fn ssh_args_carry_options_and_destination(destination: Destination<'static>) {
        let args = ssh_args(&SshConfig::default(), destination, true, "uptime");

        assert_eq!(
            strings(&args),
            vec![
                "-tt",
                "-p",
                "22",
                "-i",
                "/keys/cluster",
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "core@10.0.0.7",
                "uptime",
            ]
        );
    }

    #[rstest]
    fn strict_settings_drop_overrides(destination: Destination<'static>) {
        let config = SshConfig {
            batch_mode: false,
            strict_host_key_checking: true,
            known_hosts_file: String::new(),
            port: 2222,
            ..SshConfig::default()
        };
        let unkeyed = Destination {
            key: None,
            ..destination
        };

        let args = ssh_args(&config, unkeyed, false, "true");

        assert_eq!(strings(&args), vec!["-p", "2222", "core@10.0.0.7", "true"]);
    }

    #[rstest]
    fn scp_brackets_ipv6_hosts() {
        let destination = Destination {
            address: "fd00::5".parse().expect("address"),
            user: "root",
            key: None,
        };

        let args = scp_args(
            &SshConfig::default(),
            destination,
            Utf8Path::new("/tmp/genconf.tar"),
            Utf8Path::new("/opt/genconf.tar"),
        );

        let rendered = strings(&args);
        assert_eq!(rendered.first().map(String::as_str), Some("-P"));
        assert_eq!(
            rendered.last().map(String::as_str),
            Some("root@[fd00::5]:/opt/genconf.tar")
        );
    }

    #[rstest]
    fn absolute_key_paths_are_untouched() {
        assert_eq!(expand_home(Utf8Path::new("/etc/key")), "/etc/key");
    }
}

//! The `XSPICE_*` environment handed to Xorg.
//!
//! The spiceqxl driver reads its Spice settings from these variables, so the
//! launcher's flags become environment entries rather than xorg.conf options.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use serde::Serialize;
use tokio::process::Command;

#[cfg(target_os = "linux")]
use xspice_linux as platform;

use crate::agent::AgentSockets;
use crate::cli::Cli;
use crate::options::OptionSource;

/// Variable name prefix understood by the driver.
pub const PREFIX: &str = "XSPICE_";

/// Variables whose values must not be logged or printed.
const SECRET_NAMES: &[&str] = &["XSPICE_PASSWORD", "XSPICE_X509_KEY_PASSWORD"];

const REDACTED: &str = "********";

/// Driver environment, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DriverEnv {
    vars: BTreeMap<String, String>,
}

impl DriverEnv {
    /// Translate the launcher flags.
    ///
    /// Unset optional flags are left out so the driver falls back to its own
    /// defaults. `sockets` is only exported when the agents are enabled.
    #[must_use]
    pub fn from_cli(cli: &Cli, sockets: Option<&AgentSockets>) -> Self {
        let mut env = Self::default();

        env.set_opt("PORT", cli.port);
        env.set("TLS_PORT", cli.tls_port);
        env.set_flag("DISABLE_TICKETING", cli.disable_ticketing);
        env.set_opt("PASSWORD", cli.password.as_ref());
        env.set_flag("SASL", cli.sasl);
        env.set_path("X509_DIR", cli.x509_dir.as_deref());
        env.set_path("CACERT_FILE", cli.cacert_file.as_deref());
        env.set_path("X509_CERT_FILE", cli.x509_cert_file.as_deref());
        env.set_path("X509_KEY_FILE", cli.x509_key_file.as_deref());
        env.set_opt("X509_KEY_PASSWORD", cli.x509_key_password.as_ref());
        env.set_opt("TLS_CIPHERS", cli.tls_ciphers.as_ref());
        env.set_path("DH_FILE", cli.dh_file.as_deref());
        env.set_flag("IPV4_ONLY", cli.ipv4_only);
        env.set_flag("IPV6_ONLY", cli.ipv6_only);
        env.set("EXIT_ON_DISCONNECT", u8::from(cli.exit_on_disconnect));

        env.set_opt("IMAGE_COMPRESSION", cli.image_compression);
        env.set_opt("JPEG_WAN_COMPRESSION", cli.jpeg_wan_compression);
        env.set_opt("ZLIB_GLZ_WAN_COMPRESSION", cli.zlib_glz_wan_compression);
        env.set_opt("STREAMING_VIDEO", cli.streaming_video);
        env.set_opt("DEFERRED_FPS", cli.deferred_fps);
        env.set_opt("VIDEO_CODECS", cli.video_codecs.as_ref());
        env.set_path("AUDIO_FIFO_DIR", cli.audio_fifo_dir.as_deref());

        env.set("VDAGENT_ENABLED", u8::from(cli.vdagent_enabled));
        if cli.vdagent_enabled {
            if let Some(sockets) = sockets {
                env.set_path("VDAGENT_VIRTIO_PATH", Some(sockets.virtio.as_path()));
                env.set_path("VDAGENT_UINPUT_PATH", Some(sockets.uinput.as_path()));
            }
            env.set("VDAGENT_UID", cli.vdagent_uid.unwrap_or_else(platform::real_uid));
            env.set("VDAGENT_GID", cli.vdagent_gid.unwrap_or_else(platform::real_gid));
        }

        env
    }

    fn set(&mut self, name: &str, value: impl Display) {
        self.vars.insert(format!("{PREFIX}{name}"), value.to_string());
    }

    fn set_opt(&mut self, name: &str, value: Option<impl Display>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    fn set_flag(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.set(name, 1);
        }
    }

    fn set_path(&mut self, name: &str, value: Option<&Path>) {
        if let Some(path) = value {
            self.set(name, path.display());
        }
    }

    /// Value of a variable, by full name (`XSPICE_PORT`).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Number of exported variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether nothing is exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy with secrets masked, for logs and `--dry-run`.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let vars = self
            .vars
            .iter()
            .map(|(k, v)| {
                let value = if SECRET_NAMES.contains(&k.as_str()) {
                    REDACTED.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect();
        Self { vars }
    }

    /// Set every variable on `command`.
    pub fn apply(&self, command: &mut Command) {
        command.envs(self.vars.iter());
    }
}

impl OptionSource for DriverEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["xspice"];
        argv.extend_from_slice(args);
        argv.push(":1");
        Cli::try_parse_mixed(argv).unwrap()
    }

    #[test]
    fn test_minimal_env() {
        let env = DriverEnv::from_cli(&cli(&["--port", "5900"]), None);
        assert_eq!(env.get("XSPICE_PORT"), Some("5900"));
        assert_eq!(env.get("XSPICE_TLS_PORT"), Some("0"));
        assert_eq!(env.get("XSPICE_EXIT_ON_DISCONNECT"), Some("0"));
        assert_eq!(env.get("XSPICE_VDAGENT_ENABLED"), Some("0"));
        assert_eq!(env.get("XSPICE_DISABLE_TICKETING"), None);
        assert_eq!(env.get("XSPICE_PASSWORD"), None);
        assert_eq!(env.get("XSPICE_VDAGENT_UID"), None);
    }

    #[test]
    fn test_boolean_flags_export_one() {
        let env = DriverEnv::from_cli(
            &cli(&[
                "--disable-ticketing",
                "--sasl",
                "--ipv6-only",
                "--exit-on-disconnect",
            ]),
            None,
        );
        assert_eq!(env.get("XSPICE_DISABLE_TICKETING"), Some("1"));
        assert_eq!(env.get("XSPICE_SASL"), Some("1"));
        assert_eq!(env.get("XSPICE_IPV6_ONLY"), Some("1"));
        assert_eq!(env.get("XSPICE_EXIT_ON_DISCONNECT"), Some("1"));
        assert_eq!(env.get("XSPICE_IPV4_ONLY"), None);
    }

    #[test]
    fn test_tls_and_compression() {
        let env = DriverEnv::from_cli(
            &cli(&[
                "--tls-port=5901",
                "--x509-dir=/etc/pki/spice",
                "--tls-ciphers",
                "HIGH:!aNULL",
                "--image-compression=auto_lz",
                "--zlib-glz-wan-compression",
                "always",
                "--streaming-video=filter",
                "--deferred-fps=10",
                "--video-codecs=spice:mjpeg;gstreamer:h264",
            ]),
            None,
        );
        assert_eq!(env.get("XSPICE_TLS_PORT"), Some("5901"));
        assert_eq!(env.get("XSPICE_X509_DIR"), Some("/etc/pki/spice"));
        assert_eq!(env.get("XSPICE_TLS_CIPHERS"), Some("HIGH:!aNULL"));
        assert_eq!(env.get("XSPICE_IMAGE_COMPRESSION"), Some("auto_lz"));
        assert_eq!(env.get("XSPICE_ZLIB_GLZ_WAN_COMPRESSION"), Some("always"));
        assert_eq!(env.get("XSPICE_STREAMING_VIDEO"), Some("filter"));
        assert_eq!(env.get("XSPICE_DEFERRED_FPS"), Some("10"));
        assert_eq!(
            env.get("XSPICE_VIDEO_CODECS"),
            Some("spice:mjpeg;gstreamer:h264")
        );
    }

    #[test]
    fn test_agent_env() {
        let sockets = AgentSockets {
            udcs: PathBuf::from("/tmp/s/vdagent.udcs"),
            virtio: PathBuf::from("/tmp/s/vdagent.virtio"),
            uinput: PathBuf::from("/tmp/s/vdagent.uinput"),
        };
        let env = DriverEnv::from_cli(
            &cli(&["--vdagent", "--vdagent-uid=1001", "--vdagent-gid=1002"]),
            Some(&sockets),
        );
        assert_eq!(env.get("XSPICE_VDAGENT_ENABLED"), Some("1"));
        assert_eq!(
            env.get("XSPICE_VDAGENT_VIRTIO_PATH"),
            Some("/tmp/s/vdagent.virtio")
        );
        assert_eq!(
            env.get("XSPICE_VDAGENT_UINPUT_PATH"),
            Some("/tmp/s/vdagent.uinput")
        );
        assert_eq!(env.get("XSPICE_VDAGENT_UID"), Some("1001"));
        assert_eq!(env.get("XSPICE_VDAGENT_GID"), Some("1002"));
    }

    #[test]
    fn test_agent_ids_default_to_current_user() {
        let env = DriverEnv::from_cli(&cli(&["--vdagent"]), None);
        assert_eq!(
            env.get("XSPICE_VDAGENT_UID"),
            Some(platform::real_uid().to_string().as_str())
        );
        assert_eq!(
            env.get("XSPICE_VDAGENT_GID"),
            Some(platform::real_gid().to_string().as_str())
        );
    }

    #[test]
    fn test_sockets_ignored_without_agents() {
        let sockets = AgentSockets {
            udcs: PathBuf::from("/a"),
            virtio: PathBuf::from("/b"),
            uinput: PathBuf::from("/c"),
        };
        let env = DriverEnv::from_cli(&cli(&[]), Some(&sockets));
        assert_eq!(env.get("XSPICE_VDAGENT_VIRTIO_PATH"), None);
    }

    #[test]
    fn test_redacted() {
        let env = DriverEnv::from_cli(
            &cli(&["--password", "hunter2", "--x509-key-password=s3cret", "--port=1"]),
            None,
        );
        assert_eq!(env.get("XSPICE_PASSWORD"), Some("hunter2"));

        let redacted = env.redacted();
        assert_eq!(redacted.get("XSPICE_PASSWORD"), Some("********"));
        assert_eq!(redacted.get("XSPICE_X509_KEY_PASSWORD"), Some("********"));
        assert_eq!(redacted.get("XSPICE_PORT"), Some("1"));
        assert_eq!(redacted.len(), env.len());
    }

    #[test]
    fn test_iter_sorted_and_prefixed() {
        let env = DriverEnv::from_cli(&cli(&["--port", "5900", "--sasl"]), None);
        let names: Vec<&str> = env.iter().map(|(k, _)| k).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.iter().all(|n| n.starts_with(PREFIX)));
    }

    #[test]
    fn test_exported_booleans_pass_driver_validation() {
        let env = DriverEnv::from_cli(
            &cli(&["--sasl", "--ipv4-only", "--exit-on-disconnect", "--vdagent"]),
            None,
        );
        let source: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(crate::options::validate_inherited(&source, &HashMap::<String, String>::new()).is_ok());
    }

    #[test]
    fn test_lookup_as_option_source() {
        let env = DriverEnv::from_cli(&cli(&["--sasl"]), None);
        assert_eq!(OptionSource::get(&env, "XSPICE_SASL"), Some("1".to_string()));
        assert_eq!(OptionSource::get(&env, "XSPICE_IPV6_ONLY"), None);
    }

    #[test]
    fn test_serializes_as_map() {
        let env = DriverEnv::from_cli(&cli(&["--port", "5900"]), None);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["XSPICE_PORT"], "5900");
    }
}

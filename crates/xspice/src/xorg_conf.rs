//! Generated `xorg.conf` for `--auto` mode.

use std::fmt::Write as _;
use std::path::Path;

/// Render the configuration that loads the spiceqxl driver and the Xspice
/// input devices.
#[must_use]
pub fn render(audio_fifo_dir: Option<&Path>) -> String {
    let mut device_options = String::new();
    if let Some(dir) = audio_fifo_dir {
        let _ = writeln!(
            device_options,
            "    Option \"SpiceAudioFIFODir\" \"{}\"",
            escape(&dir.to_string_lossy())
        );
    }

    format!(
        r#"Section "Device"
    Identifier "XSPICE"
    Driver "spiceqxl"
{device_options}EndSection

Section "InputDevice"
    Identifier "XSPICE POINTER"
    Driver "xspice pointer"
EndSection

Section "InputDevice"
    Identifier "XSPICE KEYBOARD"
    Driver "xspice keyboard"
EndSection

Section "Monitor"
    Identifier "Configured Monitor"
EndSection

Section "Screen"
    Identifier "XSPICE Screen"
    Monitor "Configured Monitor"
    Device "XSPICE"
    DefaultDepth 24
EndSection

Section "ServerLayout"
    Identifier "XSPICE Example"
    Screen "XSPICE Screen"
    InputDevice "XSPICE KEYBOARD"
    InputDevice "XSPICE POINTER"
EndSection

# Prevent udev from loading vmmouse in a vm and crashing.
Section "ServerFlags"
    Option "AutoAddDevices" "False"
EndSection
"#
    )
}

/// Quote-safe value for an xorg.conf string.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_loads_driver_and_inputs() {
        let conf = render(None);
        assert!(conf.contains(r#"Driver "spiceqxl""#));
        assert!(conf.contains(r#"Driver "xspice pointer""#));
        assert!(conf.contains(r#"Driver "xspice keyboard""#));
        assert!(conf.contains("DefaultDepth 24"));
        assert!(conf.contains(r#"Option "AutoAddDevices" "False""#));
    }

    #[test]
    fn test_render_without_audio() {
        assert!(!render(None).contains("SpiceAudioFIFODir"));
    }

    #[test]
    fn test_render_with_audio_fifo_dir() {
        let dir = PathBuf::from("/run/user/1000/xspice-audio");
        let conf = render(Some(&dir));
        assert!(conf.contains(r#"Option "SpiceAudioFIFODir" "/run/user/1000/xspice-audio""#));

        // The option belongs to the Device section
        let device = conf.split("EndSection").next().unwrap();
        assert!(device.contains("SpiceAudioFIFODir"));
    }

    #[test]
    fn test_sections_balanced() {
        let conf = render(Some(Path::new("/tmp/a")));
        assert_eq!(
            conf.matches("Section \"").count(),
            conf.matches("EndSection").count()
        );
    }

    #[test]
    fn test_escape_quotes() {
        let conf = render(Some(Path::new("/tmp/we\"ird")));
        assert!(conf.contains(r#""/tmp/we\"ird""#));
    }
}

//! Check external tooling availability.

use std::process::{Command, Stdio};

pub fn run() -> anyhow::Result<()> {
    let mut all_ok = true;

    let checks: [(&str, bool, &str); 4] = [
        (
            "ffmpeg",
            command_works("ffmpeg", &["-version"]),
            "required for encoding and silence detection",
        ),
        (
            "ffprobe",
            command_works("ffprobe", &["-version"]),
            "required for audio duration probing",
        ),
        (
            "browser bridge",
            bridge_available(),
            "set DEMOREEL_BRIDGE_COMMAND if the helper is not on PATH",
        ),
        (
            "overlay font",
            demoreel_render_engine::chrome::find_system_font().is_some(),
            "optional; address-bar text is skipped without one",
        ),
    ];

    for (name, ok, hint) in checks {
        let status = if ok { "ok" } else { "missing" };
        println!("  {name:16} {status:8} {hint}");
        // Only the font is optional.
        if !ok && name != "overlay font" {
            all_ok = false;
        }
    }

    if all_ok {
        println!("\nAll required tooling found.");
        Ok(())
    } else {
        Err(anyhow::anyhow!("check failed: required tooling is missing"))
    }
}

fn command_works(binary: &str, args: &[&str]) -> bool {
    Command::new(binary)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn bridge_available() -> bool {
    let command = std::env::var("DEMOREEL_BRIDGE_COMMAND")
        .unwrap_or_else(|_| "demoreel-browser-bridge".to_string());
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {command} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

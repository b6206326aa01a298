use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");

    let version = commit()
        .map(|commit| format!("{} ({})", pkg_version(), commit))
        .unwrap_or_else(|| format!("{} (unknown commit)", pkg_version()));
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=LFPACKET_VERSION={}", version);
    println!("cargo:rustc-env=LFPACKET_PROFILE={}", profile);
}

fn pkg_version() -> String {
    env::var("CARGO_PKG_VERSION").unwrap_or_default()
}

/// The commit being built, from CI or from a local checkout
fn commit() -> Option<String> {
    if let Ok(sha) = env::var("GITHUB_SHA") {
        return Some(sha.chars().take(8).collect());
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    let commit = String::from_utf8(output.stdout).ok()?;
    Some(commit.trim().to_string()).filter(|c| !c.is_empty())
}

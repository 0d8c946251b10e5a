//! Guest customization scripts
//!
//! VMware Tools runs the script twice, with `precustomization` and
//! `postcustomization` as first argument. Keys are installed in the second
//! pass, after the guest OS has been personalized.

/// Placeholder substituted with the authorized-keys line
pub const PUBLIC_KEY_PLACEHOLDER: &str = "{{PUBLIC_KEY}}";

pub const LINUX_GUEST_CUSTOMIZATION_SCRIPT: &str = r#"#!/bin/bash
if [ x$1 == x"precustomization" ]; then
	echo 'Precustom'
elif [ x$1 == x"postcustomization" ]; then
	mkdir -p /root/.ssh
	echo '{{PUBLIC_KEY}}' >> /root/.ssh/authorized_keys
	chmod -R go-rwx /root/.ssh
fi"#;

pub const WINDOWS_GUEST_CUSTOMIZATION_SCRIPT: &str = r#"@echo off
if "%1" == "postcustomization" (
	echo {{PUBLIC_KEY}} > C:\ProgramData\ssh\administrators_authorized_keys
)"#;

/// Render a script template with the given authorized-keys line
pub fn render(template: &str, public_key: &str) -> String {
    template.replace(PUBLIC_KEY_PLACEHOLDER, public_key.trim_end())
}

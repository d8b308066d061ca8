#![allow(dead_code)]

use std::path::Path;

#[path = "../../src/testing.rs"]
mod fixtures;

pub use fixtures::{ClassBuilder, Element, invoke, jar, temp_path};

pub const INVOKESTATIC: u8 = 0xb8;

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, jar(entries))?;
    Ok(())
}

/// A class with a single `run()V` method that calls `Thread.sleep(J)V`.
pub fn sleeper(name: &str) -> Vec<u8> {
    let mut b = ClassBuilder::new(name);
    let sleep = b.method_ref("java/lang/Thread", "sleep", "(J)V");
    b.method("run", "()V", invoke(INVOKESTATIC, sleep));
    b.build()
}

pub const PAPER_YML: &[u8] = b"name: Maintenance
version: 3.0.5
main: eu.kennytv.maintenance.spigot.MaintenanceSpigotBase
description: Enable maintenance mode with a custom maintenance motd and icon.
author: KennyTV
softdepend: [ProtocolLib, ServerListPlus, ProtocolSupport]
api-version: 1.13
";

pub const BUNGEE_YML: &[u8] = b"name: Maintenance
version: 3.0.5
main: eu.kennytv.maintenance.bungee.MaintenanceBungeeBase
author: KennyTV
softDepends: [ServerListPlus]
depends: [SomePlugin]
";

pub const VELOCITY_JSON: &[u8] = br#"{
  "id": "maintenance",
  "name": "Maintenance",
  "version": "3.0.5",
  "authors": ["KennyTV"],
  "dependencies": [{"id": "serverlistplus", "optional": true}],
  "main": "eu.kennytv.maintenance.velocity.MaintenanceVelocityPlugin"
}"#;

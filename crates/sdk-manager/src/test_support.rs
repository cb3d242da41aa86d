//! Helpers for building fixture archives and SDK roots in tests

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::manifest::{Manifest, SDK_CORE_DIR};

enum Kind {
    File,
    Dir,
}

/// Builds tarballs with arbitrary (including hostile) member names
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>, Kind)>,
    gzip: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            gzip: false,
        }
    }

    /// Standard SDK bundle for `version`
    pub fn sdk(version: &str) -> Self {
        Self::new()
            .dir("sdk-core/")
            .file(
                "sdk-core/manifest.json",
                format!(
                    r#"{{"version": "{}", "requirements": [], "type": "sdk-core", "channel": ""}}"#,
                    version
                )
                .as_bytes(),
            )
            .file("sdk-core/requirements.txt", b"pyyaml\n")
            .file("sdk-core/pebble/waf", b"#!/usr/bin/env python\n")
            .gzip()
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), data.to_vec(), Kind::File));
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), Vec::new(), Kind::Dir));
        self
    }

    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    pub fn build_bytes(self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data, kind) in &self.entries {
            let mut header = tar::Header::new_gnu();
            {
                let gnu = header.as_gnu_mut().expect("gnu header");
                gnu.name[..name.len()].copy_from_slice(name.as_bytes());
            }
            match kind {
                Kind::File => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_mode(0o644);
                }
                Kind::Dir => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_mode(0o755);
                }
            }
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append(&header, data.as_slice()).expect("append entry");
        }
        let tar_bytes = builder.into_inner().expect("finish tar");

        if self.gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&tar_bytes).expect("gzip");
            encoder.finish().expect("finish gzip")
        } else {
            tar_bytes
        }
    }

    /// Write the archive to an anonymous temp file, rewound
    pub fn build(self) -> File {
        let bytes = self.build_bytes();
        let mut file = tempfile::tempfile().expect("temp file");
        file.write_all(&bytes).expect("write archive");
        file.seek(SeekFrom::Start(0)).expect("rewind");
        file
    }

    /// Write the archive to a path
    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.build_bytes()).expect("write archive");
    }
}

/// Lay out an installed SDK by hand
pub fn install_fixture(root: &Path, version: &str) {
    let manifest = Manifest {
        version: version.to_string(),
        requirements: Vec::new(),
        kind: "sdk-core".to_string(),
        channel: String::new(),
    };
    let version_root = root.join(version);
    std::fs::create_dir_all(version_root.join(SDK_CORE_DIR)).expect("create sdk dir");
    manifest.write_to(&version_root).expect("write manifest");
}

/// Dependency installer that records plans instead of running tools
#[derive(Default)]
pub struct RecordingDeps {
    plans: std::sync::Mutex<Vec<crate::deps::DependencyPlan>>,
    fail: bool,
}

impl RecordingDeps {
    pub fn failing() -> Self {
        Self {
            plans: Default::default(),
            fail: true,
        }
    }

    pub fn plans(&self) -> Vec<crate::deps::DependencyPlan> {
        self.plans.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl crate::deps::DependencyInstaller for RecordingDeps {
    async fn install(&self, plan: &crate::deps::DependencyPlan) -> crate::error::Result<()> {
        self.plans.lock().unwrap().push(plan.clone());
        if self.fail {
            return Err(crate::error::SdkError::PostInstall("pip exited with Some(1)".into()));
        }
        Ok(())
    }
}

//! Internal folder layout and manifest of an evidence archive.
//!
//! ```text
//! evidence/{category}/{filename}
//! evidence/unlinked/{filename}
//! documents/{name}
//! manifest.json
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::TenantId;

pub const UNLINKED_BUCKET: &str = "unlinked";
pub const MANIFEST_NAME: &str = "manifest.json";
pub const MANIFEST_FORMAT: u32 = 1;

const MAX_SEGMENT_LEN: usize = 120;

/// Reduce a user-supplied name to one safe path segment.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, and leading dots are
/// dropped so `.` and `..` cannot survive.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned: String = cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_SEGMENT_LEN)
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Assigns unique entry names as members are added.
#[derive(Debug, Default)]
pub struct ArchiveLayout {
    used: HashSet<String>,
}

impl ArchiveLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// `evidence/{category|unlinked}/{filename}`, prefixed with `v{version}-`
    /// (then the evidence id, then a counter) when the plain name is taken.
    pub fn evidence_entry(
        &mut self,
        category: Option<&str>,
        filename: &str,
        version: u32,
        evidence_id: i64,
    ) -> String {
        let folder = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(category) => sanitize_segment(category),
            None => UNLINKED_BUCKET.to_string(),
        };
        let name = sanitize_segment(filename);
        let candidates = [
            format!("evidence/{}/{}", folder, name),
            format!("evidence/{}/v{}-{}", folder, version, name),
            format!("evidence/{}/{}-v{}-{}", folder, evidence_id, version, name),
        ];
        self.claim(candidates, |n| {
            format!("evidence/{}/{}-v{}-{}-{}", folder, evidence_id, version, n, name)
        })
    }

    /// `documents/{name}`, numbered from 2 on collision.
    pub fn document_entry(&mut self, name: &str) -> String {
        let name = sanitize_segment(name);
        self.claim([format!("documents/{}", name)], |n| {
            format!("documents/{}-{}", n, name)
        })
    }

    /// First free candidate, else the first free `numbered(n)` for n >= 2.
    fn claim<const N: usize>(
        &mut self,
        candidates: [String; N],
        numbered: impl Fn(u32) -> String,
    ) -> String {
        for candidate in candidates {
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
        let mut n = 2;
        loop {
            let candidate = numbered(n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedMember {
    pub evidence_id: i64,
    pub path: String,
    pub filename: String,
    pub version: u32,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMember {
    pub evidence_id: i64,
    pub filename: String,
    pub reason: String,
}

/// `manifest.json` at the archive root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format: u32,
    pub tenant_id: TenantId,
    pub audit_id: i64,
    pub created_at: String,
    pub included: Vec<IncludedMember>,
    pub documents: Vec<String>,
    pub skipped: Vec<SkippedMember>,
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Path safety.
//!
//! Every path the agent supplies is relative to a virtual `C:\` root.
//! `build_full_path` turns it into a rooted, traversal-free form; the
//! slash converter rewrites forward slashes to backslashes while leaving
//! command-line switches and URLs alone so shell pass-through keeps its
//! meaning.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Longest accepted normalized path, in bytes.
pub const MAX_PATH_LEN: usize = 512;

/// Deepest accepted directory nesting.
pub const MAX_SEGMENTS: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path escapes the root")]
    Traversal,

    #[error("path too deep")]
    TooDeep,

    #[error("path too long")]
    TooLong,
}

/// A normalized path under the virtual root.
///
/// `display` is the canonical `C:\…` form shown to the user and implied
/// on the wire; `segments` are the resolved components, joined onto the
/// client's real root directory for actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    display: String,
    segments: Vec<String>,
}

impl VirtualPath {
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve against the local directory that backs the virtual root.
    pub fn to_local(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for seg in &self.segments {
            out.push(seg);
        }
        out
    }
}

fn is_switch_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '?' || c == '-' || c == '@'
}

/// Rewrite `/` to `\` with two exemptions: a slash opening a command-line
/// switch (preceded by whitespace, followed by a switch character) and
/// slashes inside a URL (from `://` to the next whitespace or quote).
pub fn convert_slashes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut prev = ' ';
    let mut in_url = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if !in_url && c == ':' && chars.get(i + 1) == Some(&'/') && chars.get(i + 2) == Some(&'/')
        {
            in_url = true;
            out.push(c);
            prev = c;
            i += 1;
            continue;
        }

        if in_url {
            if matches!(c, ' ' | '\t' | '\n' | '\r' | '"' | '\'') {
                in_url = false;
            }
            out.push(c);
            prev = c;
            i += 1;
            continue;
        }

        if c == '/' {
            let next_is_switch = chars.get(i + 1).is_some_and(|&n| is_switch_char(n));
            if (prev == ' ' || prev == '\t') && next_is_switch {
                out.push('/');
            } else {
                out.push('\\');
            }
            prev = '/';
            i += 1;
            continue;
        }

        out.push(c);
        prev = c;
        i += 1;
    }

    out
}

/// Build the rooted absolute form of a caller-supplied path.
///
/// Fails when a `..` would climb above the root, when nesting exceeds
/// [`MAX_SEGMENTS`], or when the composed path exceeds [`MAX_PATH_LEN`].
pub fn build_full_path(relative: &str) -> Result<VirtualPath, PathError> {
    let composed = if relative.is_empty() {
        "C:\\".to_string()
    } else if relative.starts_with('/') || relative.starts_with('\\') {
        format!("C:{relative}")
    } else {
        format!("C:\\{relative}")
    };

    if composed.len() >= MAX_PATH_LEN {
        return Err(PathError::TooLong);
    }

    let converted = convert_slashes(&composed);

    // Drop the drive prefix, then resolve `.` and `..` segment by segment.
    let body = converted.strip_prefix("C:").unwrap_or(&converted);
    let body = body.strip_prefix('\\').unwrap_or(body);

    let mut segments: Vec<String> = Vec::new();
    for seg in body.split('\\') {
        match seg {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::Traversal);
                }
            }
            _ => {
                if segments.len() >= MAX_SEGMENTS {
                    return Err(PathError::TooDeep);
                }
                segments.push(seg.to_string());
            }
        }
    }

    let display = if segments.is_empty() {
        "C:\\".to_string()
    } else {
        format!("C:\\{}", segments.join("\\"))
    };

    Ok(VirtualPath { display, segments })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

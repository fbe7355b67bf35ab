use kubedev_types::{EnvironmentSpec, KubeDevEnvironment, Principal};

use crate::error::{Error, Result};

const API_VERSION: &str = "kubedev.my-project.com/v1alpha1";
const KIND: &str = "KubeDevEnvironment";

/// Decodes manifest bytes as UTF-8, falling back to Windows-1252 for
/// manifests authored on non-UTF-8 systems (§4.3 step 1, grounded in the
/// original service's UTF-8-then-legacy-encoding fallback).
pub fn decode_manifest(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            if had_errors {
                tracing::warn!("manifest bytes could not be cleanly decoded even as Windows-1252");
            }
            decoded.into_owned()
        }
    }
}

/// Parses, validates, and normalizes an uploaded manifest into a CR ready
/// for submission (§4.3). Always overwrites `spec.userName` and
/// `metadata.name`/`metadata.namespace`; callers cannot forge ownership or
/// pick their own CR coordinates.
pub fn normalize_manifest(
    bytes: &[u8],
    principal: &Principal,
    cr_namespace: &str,
) -> Result<KubeDevEnvironment> {
    let text = decode_manifest(bytes);

    let raw: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|e| Error::MalformedSpec(e.to_string()))?;

    let api_version = raw
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedSpec("manifest is missing apiVersion".into()))?;
    let kind = raw
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedSpec("manifest is missing kind".into()))?;
    if api_version != API_VERSION || kind != KIND {
        return Err(Error::InvalidKind(format!(
            "expected {API_VERSION}/{KIND}, got {api_version}/{kind}"
        )));
    }

    let spec_value = raw
        .get("spec")
        .cloned()
        .ok_or_else(|| Error::MalformedSpec("manifest is missing spec".into()))?;
    let mut spec: EnvironmentSpec =
        serde_yaml::from_value(spec_value).map_err(|e| Error::MalformedSpec(e.to_string()))?;

    let sanitized_owner = sanitize_dns_label(&principal.name);
    spec.user_name = sanitized_owner.clone();

    let name = deterministic_cr_name(principal.id);
    let mut cr = KubeDevEnvironment::new(&name, spec);
    cr.metadata.namespace = Some(cr_namespace.to_string());
    Ok(cr)
}

const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A short IDE connection code, grounded in the original service's
/// `generate_access_code`: uppercase letters and digits, excluding visually
/// ambiguous characters (`0`/`O`, `1`/`I`).
pub fn generate_access_code(length: usize) -> String {
    (0..length)
        .map(|_| {
            let idx = rand::random_range(0..ACCESS_CODE_ALPHABET.len());
            ACCESS_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// The CR name this platform always assigns an owner: one orchestrator-
/// issued environment per owner per attempt (§4.3 step 4).
pub fn deterministic_cr_name(owner_id: uuid::Uuid) -> String {
    format!("env-user-{owner_id}")
}

/// DNS-1123 label sanitization (§4.3):
/// - strip non-ASCII, lowercase, replace whitespace with `-`
/// - drop any character outside `[a-z0-9-]`
/// - collapse/trim runs of `-`
/// - substitute `user` if empty, prefix `u` if it doesn't start alphanumeric
/// - truncate to 63 characters
pub fn sanitize_dns_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_dash = false;
    for ch in input.chars() {
        let mapped: Option<char> = if ch.is_ascii_alphanumeric() {
            Some(ch.to_ascii_lowercase())
        } else if ch.is_whitespace() || ch == '_' || ch == '.' {
            Some('-')
        } else if ch == '-' {
            Some('-')
        } else {
            None
        };

        match mapped {
            Some('-') => {
                if !last_was_dash && !out.is_empty() {
                    out.push('-');
                    last_was_dash = true;
                }
            }
            Some(c) => {
                out.push(c);
                last_was_dash = false;
            }
            None => {}
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        out = "user".to_string();
    }

    if !out.chars().next().unwrap().is_ascii_alphanumeric() {
        out.insert(0, 'u');
    }

    out.truncate(63);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_whitespace_and_case() {
        assert_eq!(sanitize_dns_label("Alice Smith"), "alice-smith");
    }

    #[test]
    fn collapses_and_trims_dashes() {
        assert_eq!(sanitize_dns_label("--a___b--"), "a-b");
    }

    #[test]
    fn substitutes_user_for_empty_input() {
        assert_eq!(sanitize_dns_label("!!!"), "user");
    }

    #[test]
    fn prefixes_when_leading_char_not_alphanumeric() {
        assert_eq!(sanitize_dns_label("-bob"), "ubob");
    }

    #[test]
    fn truncates_to_63_chars() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_dns_label(&long).len(), 63);
    }

    #[test]
    fn rejects_wrong_kind() {
        let principal = Principal {
            id: uuid::Uuid::nil(),
            name: "Gyu Ri".to_string(),
            is_admin: false,
        };
        let manifest = b"apiVersion: v1\nkind: Pod\nspec: {}\n";
        let err = normalize_manifest(manifest, &principal, "kubdev-users").unwrap_err();
        assert!(matches!(err, Error::InvalidKind(_)));
    }

    #[test]
    fn overwrites_username_and_name() {
        let principal = Principal {
            id: uuid::Uuid::nil(),
            name: "Gyu Ri".to_string(),
            is_admin: false,
        };
        let manifest = br#"
apiVersion: kubedev.my-project.com/v1alpha1
kind: KubeDevEnvironment
spec:
  userName: someone-else
  image: "code-server:latest"
"#;
        let cr = normalize_manifest(manifest, &principal, "kubdev-users").unwrap();
        assert_eq!(cr.metadata.name.as_deref(), Some("env-user-00000000-0000-0000-0000-000000000000"));
        assert_eq!(cr.spec.user_name, "gyu-ri");
    }
}

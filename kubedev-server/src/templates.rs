//! Resolves a `template_id` (as passed to `create_stream`, §6) into
//! manifest bytes.
//!
//! The user/template directory is explicitly out of scope for the
//! orchestrator (§1): the real catalog of templates lives in an external
//! service this adapter calls out to, the same way `eosin-iam-client`
//! calls out to the IAM service. When no directory URL is configured this
//! client falls back to a single built-in `blank` template so the binary
//! is runnable standalone.

use anyhow::{Context, Result, bail};

const BLANK_TEMPLATE: &str = r#"
apiVersion: kubedev.my-project.com/v1alpha1
kind: KubeDevEnvironment
spec:
  image: "codercom/code-server:latest"
  ports: [8080]
  storage:
    size: "10Gi"
"#;

#[derive(Clone)]
pub struct TemplateClient {
    http: reqwest::Client,
    directory_url: Option<String>,
}

impl TemplateClient {
    pub fn new(directory_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            directory_url,
        }
    }

    pub async fn resolve(&self, template_id: &str) -> Result<Vec<u8>> {
        if let Some(base) = &self.directory_url {
            let url = format!("{}/templates/{}", base.trim_end_matches('/'), template_id);
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .context("failed to reach template directory")?;
            if !resp.status().is_success() {
                bail!(
                    "template directory returned {} for template {}",
                    resp.status(),
                    template_id
                );
            }
            return Ok(resp
                .bytes()
                .await
                .context("failed to read template directory response")?
                .to_vec());
        }

        if template_id == "blank" {
            return Ok(BLANK_TEMPLATE.as_bytes().to_vec());
        }

        bail!(
            "no template directory configured and template {} is not the built-in default",
            template_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_builtin_blank_template_without_a_directory() {
        let client = TemplateClient::new(None);
        let bytes = client.resolve("blank").await.unwrap();
        assert_eq!(bytes, BLANK_TEMPLATE.as_bytes());
    }

    #[tokio::test]
    async fn unknown_template_without_a_directory_errors() {
        let client = TemplateClient::new(None);
        let err = client.resolve("does-not-exist").await.unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }
}

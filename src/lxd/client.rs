use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Certificate, Client, Identity, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::LxdError;
use super::types::{
    CertificateRequest, CopyInstanceRequest, CopySource, ExecMetadata, ExecRequest, ExecResult,
    Instance, InstanceState, Operation, RESPONSE_TYPE_ERROR, ResponseEnvelope, ServerInfo,
    StateAction, StateRequest,
};

const API_PREFIX: &str = "/1.0";
const CERT_TYPE_CLIENT: &str = "client";
const SOURCE_TYPE_COPY: &str = "copy";
const STDOUT_FD: &str = "1";
const STDERR_FD: &str = "2";
const STATE_TIMEOUT_SECS: i64 = 30;
// the wait endpoint needs a little longer than the server-side timeout
const WAIT_GRACE_SECS: u64 = 10;

/// TLS material used to reach the daemon.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Client certificate followed by its private key, both PEM.
    pub identity_pem: Option<Vec<u8>>,
    /// Server certificate to trust, PEM.
    pub server_cert_pem: Option<Vec<u8>>,
    pub verify: bool,
}

/// Thin async client for the LXD REST API.
#[derive(Debug, Clone)]
pub struct LxdClient {
    base_url: String,
    client: Client,
    operation_timeout_secs: u64,
}

impl LxdClient {
    /// Builds a client for `endpoint`.
    ///
    /// # Errors
    /// Returns error if the TLS material is invalid or the HTTP client fails to build.
    pub fn new(
        endpoint: &str,
        tls: &TlsOptions,
        operation_timeout_secs: u64,
    ) -> Result<Self, LxdError> {
        let mut builder = Client::builder();
        if let Some(pem) = &tls.identity_pem {
            let identity = Identity::from_pem(pem)
                .map_err(|e| LxdError::Tls(format!("client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        if let Some(pem) = &tls.server_cert_pem {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| LxdError::Tls(format!("server certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if !tls.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            client: builder.build()?,
            operation_timeout_secs,
        })
    }

    /// Reads `GET /1.0`.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn server_info(&self) -> Result<ServerInfo, LxdError> {
        self.get_json("").await
    }

    /// Adds the client certificate to the trust store using the trust password.
    /// Does nothing when the client is already trusted.
    ///
    /// # Errors
    /// Returns error if the server rejects the password.
    pub async fn authenticate(&self, password: &str) -> Result<(), LxdError> {
        if self.server_info().await?.is_trusted() {
            debug!("LXD client certificate already trusted");
            return Ok(());
        }
        let body = CertificateRequest {
            cert_type: CERT_TYPE_CLIENT,
            password,
        };
        let path = "certificates";
        self.execute(self.client.post(self.endpoint(path)).json(&body), path)
            .await?;
        if !self.server_info().await?.is_trusted() {
            return Err(LxdError::Untrusted);
        }
        info!("LXD client certificate added to the trust store");
        Ok(())
    }

    /// Lists every instance with its status.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_instances(&self) -> Result<Vec<Instance>, LxdError> {
        self.get_json("instances?recursion=1").await
    }

    /// Fetches an instance; a missing instance yields `None`.
    ///
    /// # Errors
    /// Returns error if the request fails for any other reason.
    pub async fn get_instance(&self, name: &str) -> Result<Option<Instance>, LxdError> {
        match self.get_json(&format!("instances/{name}")).await {
            Ok(instance) => Ok(Some(instance)),
            Err(LxdError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Creates `name` as a copy of `source` and waits for completion.
    ///
    /// # Errors
    /// Returns error if the request or the copy operation fails.
    pub async fn copy_instance(&self, source: &str, name: &str) -> Result<Operation, LxdError> {
        let body = CopyInstanceRequest {
            name,
            source: CopySource {
                source_type: SOURCE_TYPE_COPY,
                source,
            },
        };
        let path = "instances";
        let envelope = self
            .execute(self.client.post(self.endpoint(path)).json(&body), path)
            .await?;
        self.wait_envelope(envelope, path).await
    }

    /// Changes the running state of an instance and waits for completion.
    ///
    /// # Errors
    /// Returns error if the request or the state operation fails.
    pub async fn change_state(
        &self,
        name: &str,
        action: StateAction,
        force: bool,
    ) -> Result<Operation, LxdError> {
        let body = StateRequest {
            action,
            timeout: STATE_TIMEOUT_SECS,
            force,
        };
        let path = format!("instances/{name}/state");
        let envelope = self
            .execute(self.client.put(self.endpoint(&path)).json(&body), &path)
            .await?;
        self.wait_envelope(envelope, &path).await
    }

    /// Deletes an instance and waits for completion.
    ///
    /// # Errors
    /// Returns error if the request or the delete operation fails.
    pub async fn delete_instance(&self, name: &str) -> Result<Operation, LxdError> {
        let path = format!("instances/{name}");
        let envelope = self
            .execute(self.client.delete(self.endpoint(&path)), &path)
            .await?;
        self.wait_envelope(envelope, &path).await
    }

    /// Reads the runtime state (status, network) of an instance.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn instance_state(&self, name: &str) -> Result<InstanceState, LxdError> {
        self.get_json(&format!("instances/{name}/state")).await
    }

    /// Runs `command` inside an instance and collects its recorded output.
    ///
    /// # Errors
    /// Returns error if the exec operation or the log retrieval fails.
    pub async fn exec(&self, name: &str, command: &[String]) -> Result<ExecResult, LxdError> {
        let body = ExecRequest {
            command,
            environment: HashMap::new(),
            wait_for_websocket: false,
            interactive: false,
            record_output: true,
        };
        let path = format!("instances/{name}/exec");
        let envelope = self
            .execute(self.client.post(self.endpoint(&path)).json(&body), &path)
            .await?;
        let operation = self.wait_envelope(envelope, &path).await?;
        let metadata: ExecMetadata = match operation.metadata {
            Some(value) => serde_json::from_value(value).map_err(|source| LxdError::Decode {
                path: path.clone(),
                source,
            })?,
            None => return Err(LxdError::MissingOperation(path)),
        };
        let stdout = match metadata.output.get(STDOUT_FD) {
            Some(log) => self.read_log(log).await?,
            None => String::new(),
        };
        let stderr = match metadata.output.get(STDERR_FD) {
            Some(log) => self.read_log(log).await?,
            None => String::new(),
        };
        Ok(ExecResult {
            exit_code: metadata.return_code,
            stdout,
            stderr,
        })
    }

    /// Downloads a raw log file (e.g. recorded exec output).
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn read_log(&self, path: &str) -> Result<String, LxdError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Err(LxdError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(LxdError::Api {
                path: path.to_string(),
                code: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    /// Blocks on `GET <operation>/wait` until the operation ends.
    ///
    /// # Errors
    /// Returns error if the operation failed or the wait request failed.
    pub async fn wait_operation(&self, operation: &str) -> Result<Operation, LxdError> {
        let path = format!("{operation}/wait?timeout={}", self.operation_timeout_secs);
        let request = self
            .client
            .get(self.endpoint(&path))
            .timeout(Duration::from_secs(
                self.operation_timeout_secs + WAIT_GRACE_SECS,
            ));
        let envelope = self.execute(request, &path).await?;
        let op: Operation = decode(envelope.metadata, &path)?;
        if op.failed() {
            return Err(LxdError::Operation {
                id: op.id,
                message: if op.err.is_empty() { op.status } else { op.err },
            });
        }
        debug!("LXD operation {} finished: {}", op.id, op.status);
        Ok(op)
    }

    async fn wait_envelope(
        &self,
        envelope: ResponseEnvelope,
        path: &str,
    ) -> Result<Operation, LxdError> {
        if envelope.operation.is_empty() {
            return Err(LxdError::MissingOperation(path.to_string()));
        }
        self.wait_operation(&envelope.operation).await
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else if path.is_empty() {
            format!("{}{API_PREFIX}", self.base_url)
        } else {
            format!("{}{API_PREFIX}/{path}", self.base_url)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LxdError> {
        let envelope = self
            .execute(self.client.get(self.endpoint(path)), path)
            .await?;
        decode(envelope.metadata, path)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<ResponseEnvelope, LxdError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let envelope = serde_json::from_str::<ResponseEnvelope>(&text);
        if status == StatusCode::NOT_FOUND {
            return Err(LxdError::NotFound(path.to_string()));
        }
        match envelope {
            Ok(envelope) if status.is_success() && envelope.kind != RESPONSE_TYPE_ERROR => {
                Ok(envelope)
            }
            Ok(envelope) => Err(LxdError::Api {
                path: path.to_string(),
                code: if envelope.error_code == 0 {
                    status.as_u16()
                } else {
                    envelope.error_code
                },
                message: envelope.error,
            }),
            Err(_) if !status.is_success() => Err(LxdError::Api {
                path: path.to_string(),
                code: status.as_u16(),
                message: text,
            }),
            Err(source) => Err(LxdError::Decode {
                path: path.to_string(),
                source,
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, path: &str) -> Result<T, LxdError> {
    serde_json::from_value(value).map_err(|source| LxdError::Decode {
        path: path.to_string(),
        source,
    })
}

//! JSON-RPC provider over a Unix socket.
//!
//! Talks newline-delimited JSON-RPC 2.0 to a ledger gateway sidecar that
//! holds the signing keys and a node connection. One request per line, one
//! response per line, on a single persistent connection. The connection is
//! reopened after an I/O error, an undecodable reply, or a call that was
//! cancelled before its reply was read.
//!
//! | Method | Params | Result |
//! |---|---|---|
//! | `sendMessage` | `sender, to, value, body, stateInit?, bounce, idempotencyKey` | `submissionId` |
//! | `getSubmissionStatus` | `submissionId` | `status` = `pending` \| `confirmed` (`txHash`) \| `failed` (`exitCode?`, `reason`) |
//! | `runGetMethod` | `address, method, stack` | `exitCode, stack` |
//! | `getShareHolders` | `vault` | `holders: [{owner, balance}]` |
//!
//! Addresses are raw strings, amounts and stack integers decimal strings,
//! cells base64 BOC. `idempotencyKey` is the hex message fingerprint, so a
//! gateway can drop a resend of a message it already accepted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vaultkit_cell::{boc, Address};
use vaultkit_protocol::stack::StackValue;

use crate::provider::{
    LedgerProvider, OutboundMessage, PendingSubmission, ShareHolder, ShareholderIndex,
    SubmissionStatus, TxHash,
};
use crate::{ClientError, Result};

/// One stack entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireStackEntry {
    Null,
    Num { value: String },
    Cell { boc: String },
    Slice { boc: String },
}

impl From<&StackValue> for WireStackEntry {
    fn from(value: &StackValue) -> Self {
        match value {
            StackValue::Null => WireStackEntry::Null,
            StackValue::Int(v) => WireStackEntry::Num {
                value: v.to_string(),
            },
            StackValue::Cell(c) => WireStackEntry::Cell {
                boc: boc::to_base64(c),
            },
            StackValue::Slice(c) => WireStackEntry::Slice {
                boc: boc::to_base64(c),
            },
        }
    }
}

impl TryFrom<WireStackEntry> for StackValue {
    type Error = ClientError;

    fn try_from(entry: WireStackEntry) -> Result<Self> {
        Ok(match entry {
            WireStackEntry::Null => StackValue::Null,
            WireStackEntry::Num { value } => StackValue::Int(value.parse().map_err(|e| {
                ClientError::GatewayProtocol(format!("bad stack integer {value:?}: {e}"))
            })?),
            WireStackEntry::Cell { boc } => StackValue::Cell(boc::from_base64(&boc)?),
            WireStackEntry::Slice { boc } => StackValue::Slice(boc::from_base64(&boc)?),
        })
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: serde_json::Value,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i32,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageParams {
    sender: Address,
    to: Address,
    value: String,
    body: String,
    state_init: Option<String>,
    bounce: bool,
    idempotency_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResult {
    submission_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StatusResult {
    Pending,
    Confirmed {
        #[serde(rename = "txHash")]
        tx_hash: String,
    },
    Failed {
        #[serde(rename = "exitCode", default)]
        exit_code: Option<i32>,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunGetMethodResult {
    exit_code: i32,
    stack: Vec<WireStackEntry>,
}

#[derive(Debug, Deserialize)]
struct ShareHoldersResult {
    holders: Vec<WireHolder>,
}

#[derive(Debug, Deserialize)]
struct WireHolder {
    owner: Address,
    balance: String,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set while a request is written but its reply not yet read.
    in_flight: bool,
}

impl Connection {
    async fn open(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            in_flight: false,
        })
    }

    async fn round_trip(&mut self, request: &str) -> Result<String> {
        self.in_flight = true;
        self.writer.write_all(request.as_bytes()).await?;
        self.writer.flush().await?;
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(ClientError::Io("gateway closed the connection".to_string()));
        }
        self.in_flight = false;
        Ok(line)
    }
}

fn decode_response(line: &str, id: u64) -> Result<RpcResponse> {
    let response: RpcResponse = serde_json::from_str(line)?;
    if response.id != serde_json::Value::from(id) {
        return Err(ClientError::GatewayProtocol(format!(
            "response id {} does not match request id {id}",
            response.id
        )));
    }
    Ok(response)
}

/// [`LedgerProvider`] and [`ShareholderIndex`] backed by the gateway sidecar.
pub struct GatewayProvider {
    socket_path: PathBuf,
    next_id: AtomicU64,
    conn: Mutex<Option<Connection>>,
}

impl GatewayProvider {
    /// Provider that connects lazily on first use.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            next_id: AtomicU64::new(1),
            conn: Mutex::new(None),
        }
    }

    /// Provider with the connection opened up front.
    pub async fn connect(socket_path: impl Into<PathBuf>) -> Result<Self> {
        let provider = Self::new(socket_path);
        let conn = Connection::open(&provider.socket_path).await?;
        *provider.conn.lock().await = Some(conn);
        info!("connected to ledger gateway at {:?}", provider.socket_path);
        Ok(provider)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;
        line.push('\n');
        debug!(method, id, "gateway request");

        let response = {
            let mut guard = self.conn.lock().await;
            // A cancelled call leaves its reply unread on the stream.
            if guard.as_ref().is_some_and(|c| c.in_flight) {
                warn!(method, "discarding gateway connection left mid-call");
                *guard = None;
            }
            if guard.is_none() {
                *guard = Some(Connection::open(&self.socket_path).await?);
            }
            let Some(conn) = guard.as_mut() else {
                return Err(ClientError::Io("gateway connection unavailable".to_string()));
            };
            let response_line = match conn.round_trip(&line).await {
                Ok(l) => l,
                Err(e) => {
                    warn!(method, error = %e, "gateway connection dropped");
                    *guard = None;
                    return Err(e);
                }
            };
            match decode_response(&response_line, id) {
                Ok(r) => r,
                Err(e) => {
                    warn!(method, error = %e, "undecodable gateway reply, reconnecting");
                    *guard = None;
                    return Err(e);
                }
            }
        };

        if let Some(err) = response.error {
            return Err(ClientError::Gateway {
                code: err.code,
                message: err.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| ClientError::GatewayProtocol(format!("{method}: missing result")))?;
        Ok(serde_json::from_value(result)?)
    }
}

impl LedgerProvider for GatewayProvider {
    async fn submit(
        &self,
        sender: &Address,
        message: &OutboundMessage,
    ) -> Result<PendingSubmission> {
        let state_init = match &message.state_init {
            Some(init) => Some(boc::to_base64(&init.to_cell()?)),
            None => None,
        };
        let params = serde_json::to_value(SendMessageParams {
            sender: *sender,
            to: message.to,
            value: message.value.to_string(),
            body: boc::to_base64(&message.body),
            state_init,
            bounce: message.bounce,
            idempotency_key: hex::encode(message.fingerprint()),
        })?;
        let result: SendMessageResult = self.call("sendMessage", params).await?;
        Ok(PendingSubmission {
            id: result.submission_id,
        })
    }

    async fn submission_status(&self, pending: &PendingSubmission) -> Result<SubmissionStatus> {
        let params = serde_json::json!({ "submissionId": pending.id });
        let result: StatusResult = self.call("getSubmissionStatus", params).await?;
        Ok(match result {
            StatusResult::Pending => SubmissionStatus::Pending,
            StatusResult::Confirmed { tx_hash } => {
                let bytes = hex::decode(&tx_hash)
                    .map_err(|e| ClientError::GatewayProtocol(format!("bad txHash: {e}")))?;
                let hash: [u8; 32] = bytes.try_into().map_err(|_| {
                    ClientError::GatewayProtocol("txHash must be 32 bytes".to_string())
                })?;
                SubmissionStatus::Confirmed(TxHash(hash))
            }
            StatusResult::Failed { exit_code, reason } => {
                SubmissionStatus::Failed { exit_code, reason }
            }
        })
    }

    async fn run_get_method(
        &self,
        address: &Address,
        method: &str,
        args: Vec<StackValue>,
    ) -> Result<Vec<StackValue>> {
        let stack: Vec<WireStackEntry> = args.iter().map(WireStackEntry::from).collect();
        let params = serde_json::json!({
            "address": address,
            "method": method,
            "stack": stack,
        });
        let result: RunGetMethodResult = self.call("runGetMethod", params).await?;
        // 0 and 1 are both successful compute-phase exits.
        if result.exit_code != 0 && result.exit_code != 1 {
            return Err(ClientError::GetMethodFailed {
                method: method.to_string(),
                exit_code: result.exit_code,
            });
        }
        result.stack.into_iter().map(StackValue::try_from).collect()
    }
}

impl ShareholderIndex for GatewayProvider {
    async fn share_holders(&self, vault: &Address) -> Result<Vec<ShareHolder>> {
        let params = serde_json::json!({ "vault": vault });
        let result: ShareHoldersResult = self.call("getShareHolders", params).await?;
        result
            .holders
            .into_iter()
            .map(|h| {
                let balance = h.balance.parse().map_err(|e| {
                    ClientError::GatewayProtocol(format!("bad balance {:?}: {e}", h.balance))
                })?;
                Ok(ShareHolder {
                    owner: h.owner,
                    balance,
                })
            })
            .collect()
    }
}

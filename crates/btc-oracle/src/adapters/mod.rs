//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the outbound ports.
//!
//! | Adapter | Port |
//! |---------|------|
//! | `BitcoinRpcClient` | `ChainReader` |
//! | `EsploraHistory` | `HistoryLookup` |
//! | `LedgerRpcClient` | `LedgerPublisher`, `LedgerQuery` |
//! | `InMemoryChain` | `ChainReader`, `HistoryLookup` |
//! | `InMemoryLedger` | `LedgerPublisher`, `LedgerQuery` |
//! | `ChannelTransport` | `MessageTransport` |
//! | `LogNotifier`, `RecordingNotifier` | `OperatorNotifier` |

mod bitcoin_rpc;
mod channel;
mod esplora;
mod json_rpc;
mod ledger_rpc;
mod memory;
mod notifier;

pub use bitcoin_rpc::{BitcoinRpcClient, RpcBlock, RpcOutput, RpcScriptPubKey, RpcTransaction};
pub use channel::{inbound_channel, ChannelTransport, OutboundMessage};
pub use esplora::{select_incoming, EsploraHistory, EsploraOutput, EsploraStatus, EsploraTx};
pub use ledger_rpc::{feed_from_entries, LedgerRpcClient};
pub use memory::{InMemoryChain, InMemoryLedger, RecordingNotifier};
pub use notifier::LogNotifier;

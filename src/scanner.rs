//! Chain scanners.
//!
//! Both chains are exposed through the same [`ChainScanner`] capability; the
//! collector is composed with one implementation per chain.

mod l1;
mod l2;

pub use l1::{L1Contracts, L1Scanner};
pub use l2::L2Scanner;

use anyhow::Result;
use async_trait::async_trait;

use crate::repository::{Chain, TokenUpdate};

#[async_trait]
pub trait ChainScanner: Send + Sync {
    fn chain(&self) -> Chain;

    /// Current head block number.
    async fn head(&self) -> Result<u64>;

    /// Partial token records for every relevant event in `[from_block, to_block]`.
    async fn scan(&self, from_block: u64, to_block: u64) -> Result<Vec<TokenUpdate>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Captures formatted `tracing` output for assertions.
    #[derive(Clone, Default)]
    pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        pub fn install(&self) -> tracing::subscriber::DefaultGuard {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(move || sink.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

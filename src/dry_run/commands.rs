use crate::address::normalize_l1_address;
use crate::dry_run::formatters::{
    OutputFormat, format_allow_list, format_heads, format_l1_registrations,
    format_l2_registrations,
};
use crate::rollup::RollupClient;
use crate::rpc::EvmClient;
use crate::scanner::{ChainScanner, L1Scanner, L2Scanner};
use anyhow::Result;

/// Block range for a dry run; `to` defaults to the chain head.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl BlockRange {
    async fn resolve<S: ChainScanner>(&self, scanner: &S) -> Result<(u64, u64)> {
        let to = match self.to {
            Some(to) => to,
            None => scanner.head().await?,
        };
        if self.from > to {
            return Err(anyhow::anyhow!(
                "Invalid block range: --from {} is after --to {}",
                self.from,
                to
            ));
        }
        Ok((self.from, to))
    }
}

fn token_filter(token: Option<&str>) -> Result<Option<String>> {
    token
        .map(|t| {
            normalize_l1_address(t).map_err(|e| anyhow::anyhow!("Invalid token address: {}", e))
        })
        .transpose()
}

pub async fn cmd_l1_registrations<C: EvmClient>(
    scanner: &L1Scanner<C>,
    range: BlockRange,
    token: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let token = token_filter(token)?;
    let (from, to) = range.resolve(scanner).await?;

    let mut registrations = scanner.scan_registrations(from, to).await?;
    if let Some(token) = token {
        registrations.retain(|r| r.l1_address == token);
    }

    let output = format_l1_registrations(&registrations, format);
    println!("{output}");

    Ok(())
}

pub async fn cmd_allow_list<C: EvmClient>(
    scanner: &L1Scanner<C>,
    range: BlockRange,
    token: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let token = token_filter(token)?;
    let (from, to) = range.resolve(scanner).await?;

    let mut updates = scanner.scan_allow_list(from, to).await?;
    if let Some(token) = token {
        updates.retain(|u| u.l1_address == token);
    }

    let output = format_allow_list(&updates, format);
    println!("{output}");

    Ok(())
}

pub async fn cmd_l2_registrations<R: RollupClient>(
    scanner: &L2Scanner<R>,
    range: BlockRange,
    token: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let token = token_filter(token)?;
    let (from, to) = range.resolve(scanner).await?;

    let mut registrations = scanner.scan_registrations(from, to).await?;
    if let Some(token) = token {
        registrations.retain(|r| r.l1_address == token);
    }

    let output = format_l2_registrations(&registrations, format);
    println!("{output}");

    Ok(())
}

pub async fn cmd_heads<A: ChainScanner, B: ChainScanner>(
    l1: &A,
    l2: &B,
    format: &OutputFormat,
) -> Result<()> {
    let (l1_head, l2_head) = tokio::try_join!(l1.head(), l2.head())?;
    let output = format_heads(l1_head, l2_head, format);
    println!("{output}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Chain, TokenUpdate};
    use async_trait::async_trait;

    struct FixedHead(u64);

    #[async_trait]
    impl ChainScanner for FixedHead {
        fn chain(&self) -> Chain {
            Chain::L1
        }

        async fn head(&self) -> Result<u64> {
            Ok(self.0)
        }

        async fn scan(&self, _from_block: u64, _to_block: u64) -> Result<Vec<TokenUpdate>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn open_range_ends_at_head() {
        let range = BlockRange { from: 10, to: None };
        assert_eq!(range.resolve(&FixedHead(250)).await.unwrap(), (10, 250));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let range = BlockRange {
            from: 300,
            to: Some(200),
        };
        assert!(range.resolve(&FixedHead(250)).await.is_err());
    }

    #[test]
    fn token_filter_normalizes_case() {
        let token = token_filter(Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")).unwrap();
        assert_eq!(
            token.as_deref(),
            Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
        );
        assert!(token_filter(Some("nope")).is_err());
        assert_eq!(token_filter(None).unwrap(), None);
    }
}

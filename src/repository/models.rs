use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Chain {
    L1,
    L2,
}

impl Chain {
    pub fn label(&self) -> &'static str {
        match self {
            Chain::L1 => "L1",
            Chain::L2 => "L2",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowListStatus {
    Proposed,
    Accepted,
    Rejected,
}

impl AllowListStatus {
    /// Maps the on-chain status code; `None` for unset or unknown codes.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AllowListStatus::Proposed),
            2 => Some(AllowListStatus::Accepted),
            3 => Some(AllowListStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllowListStatus::Proposed => "PROPOSED",
            AllowListStatus::Accepted => "ACCEPTED",
            AllowListStatus::Rejected => "REJECTED",
        }
    }

    /// Accepted and rejected close a proposal.
    pub fn is_resolution(&self) -> bool {
        matches!(self, AllowListStatus::Accepted | AllowListStatus::Rejected)
    }
}

impl FromStr for AllowListStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSED" => Ok(AllowListStatus::Proposed),
            "ACCEPTED" => Ok(AllowListStatus::Accepted),
            "REJECTED" => Ok(AllowListStatus::Rejected),
            other => Err(anyhow::anyhow!("Unknown allow-list status: {}", other)),
        }
    }
}

/// Settlement-chain registration, correlated with its inbox message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L1Registration {
    pub l1_address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub block_number: u64,
    pub transaction_hash: String,
    /// Rollup block carried by the correlated inbox message.
    pub l2_block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2Registration {
    pub l1_address: String,
    pub l2_address: String,
    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowListUpdate {
    pub l1_address: String,
    pub status: AllowListStatus,
    pub block_number: u64,
    pub transaction_hash: String,
}

impl AllowListUpdate {
    pub fn proposal_tx(&self) -> Option<&str> {
        (!self.status.is_resolution()).then_some(self.transaction_hash.as_str())
    }

    pub fn resolution_tx(&self) -> Option<&str> {
        self.status
            .is_resolution()
            .then_some(self.transaction_hash.as_str())
    }
}

/// A partial token record produced by one scanned event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenUpdate {
    L1Registration(L1Registration),
    L2Registration(L2Registration),
    AllowList(AllowListUpdate),
}

impl TokenUpdate {
    pub fn block_number(&self) -> u64 {
        match self {
            TokenUpdate::L1Registration(r) => r.block_number,
            TokenUpdate::L2Registration(r) => r.block_number,
            TokenUpdate::AllowList(u) => u.block_number,
        }
    }
}

/// A joined row of the `tokens` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    pub l1_address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
    pub l1_registration_block: Option<u64>,
    pub l1_registration_tx: Option<String>,
    pub l1_message_l2_block: Option<u64>,
    pub l2_address: Option<String>,
    pub l2_registration_block: Option<u64>,
    pub l2_registration_tx_index: Option<u64>,
    pub l2_registration_log_index: Option<u64>,
    pub allow_list_status: Option<AllowListStatus>,
    pub allow_list_proposal_tx: Option<String>,
    pub allow_list_resolution_tx: Option<String>,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_states() {
        assert_eq!(AllowListStatus::from_code(1), Some(AllowListStatus::Proposed));
        assert_eq!(AllowListStatus::from_code(2), Some(AllowListStatus::Accepted));
        assert_eq!(AllowListStatus::from_code(3), Some(AllowListStatus::Rejected));
        assert_eq!(AllowListStatus::from_code(0), None);
        assert_eq!(AllowListStatus::from_code(7), None);
    }

    #[test]
    fn resolution_statuses_record_resolution_tx() {
        let update = AllowListUpdate {
            l1_address: "0x02".into(),
            status: AllowListStatus::Rejected,
            block_number: 1,
            transaction_hash: "0xdef".into(),
        };
        assert_eq!(update.resolution_tx(), Some("0xdef"));
        assert_eq!(update.proposal_tx(), None);
    }

    #[test]
    fn proposals_record_proposal_tx() {
        let update = AllowListUpdate {
            l1_address: "0x02".into(),
            status: AllowListStatus::Proposed,
            block_number: 1,
            transaction_hash: "0xabc".into(),
        };
        assert_eq!(update.proposal_tx(), Some("0xabc"));
        assert_eq!(update.resolution_tx(), None);
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            AllowListStatus::Proposed,
            AllowListStatus::Accepted,
            AllowListStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<AllowListStatus>().unwrap(), status);
        }
    }
}

// src/models/status.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

// =============================================================================
//  LOTE (CropBatch)
// =============================================================================

/// Status do lote. A tabela de transições abaixo é a ÚNICA fonte da verdade:
/// todas as ações (campo, compras, armazém, transporte) consultam `can_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "batch_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Planted,
    Growing,
    ReadyForHarvest,
    Harvested,
    PendingApproval,
    Processed,
    ReadyForPackaging,
    Packaging,
    Packaged,
    Shipped,
    Received,
    Stored,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 12] = [
        BatchStatus::Planted,
        BatchStatus::Growing,
        BatchStatus::ReadyForHarvest,
        BatchStatus::Harvested,
        BatchStatus::PendingApproval,
        BatchStatus::Processed,
        BatchStatus::ReadyForPackaging,
        BatchStatus::Packaging,
        BatchStatus::Packaged,
        BatchStatus::Shipped,
        BatchStatus::Received,
        BatchStatus::Stored,
    ];

    /// Próximos status permitidos a partir do status atual.
    pub fn next_allowed(self) -> &'static [BatchStatus] {
        use BatchStatus::*;
        match self {
            Planted => &[Growing],
            Growing => &[ReadyForHarvest],
            ReadyForHarvest => &[Harvested],
            Harvested => &[Processed, PendingApproval],
            // Aprovar -> PROCESSED, Rejeitar (retrabalho) -> READY_FOR_HARVEST
            PendingApproval => &[Processed, ReadyForHarvest],
            Processed => &[ReadyForPackaging],
            ReadyForPackaging => &[Packaging],
            Packaging => &[Packaged],
            // Recebimento aceita o lote direto do empacotamento ou já despachado
            Packaged => &[Shipped, Received],
            Shipped => &[Received],
            Received => &[Stored],
            Stored => &[],
        }
    }

    pub fn can_transition(self, target: BatchStatus) -> bool {
        self.next_allowed().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.next_allowed().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        use BatchStatus::*;
        match self {
            Planted => "PLANTED",
            Growing => "GROWING",
            ReadyForHarvest => "READY_FOR_HARVEST",
            Harvested => "HARVESTED",
            PendingApproval => "PENDING_APPROVAL",
            Processed => "PROCESSED",
            ReadyForPackaging => "READY_FOR_PACKAGING",
            Packaging => "PACKAGING",
            Packaged => "PACKAGED",
            Shipped => "SHIPPED",
            Received => "RECEIVED",
            Stored => "STORED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valida a transição e devolve um erro que nomeia os dois status.
pub fn validate_batch_transition(current: BatchStatus, target: BatchStatus) -> Result<(), AppError> {
    if current.can_transition(target) {
        Ok(())
    } else {
        Err(AppError::IllegalStatusTransition {
            from: current.to_string(),
            to: target.to_string(),
        })
    }
}

// =============================================================================
//  TRANSPORTE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transport_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportStatus {
    Scheduled,
    InTransit,
    Delivered,
    Delayed,
    Cancelled,
}

impl TransportStatus {
    pub const ALL: [TransportStatus; 5] = [
        TransportStatus::Scheduled,
        TransportStatus::InTransit,
        TransportStatus::Delivered,
        TransportStatus::Delayed,
        TransportStatus::Cancelled,
    ];

    pub fn next_allowed(self) -> &'static [TransportStatus] {
        use TransportStatus::*;
        match self {
            Scheduled => &[InTransit, Delayed, Cancelled],
            Delayed => &[Scheduled, InTransit, Cancelled],
            InTransit => &[Delivered, Delayed],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition(self, target: TransportStatus) -> bool {
        self.next_allowed().contains(&target)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportStatus::Scheduled => "SCHEDULED",
            TransportStatus::InTransit => "IN_TRANSIT",
            TransportStatus::Delivered => "DELIVERED",
            TransportStatus::Delayed => "DELAYED",
            TransportStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_transport_transition(
    current: TransportStatus,
    target: TransportStatus,
) -> Result<(), AppError> {
    if current.can_transition(target) {
        Ok(())
    } else {
        Err(AppError::IllegalStatusTransition {
            from: current.to_string(),
            to: target.to_string(),
        })
    }
}

// =============================================================================
//  OCORRÊNCIAS DE TRANSPORTE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "issue_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Escalated,
}

impl IssueStatus {
    pub fn next_allowed(self) -> &'static [IssueStatus] {
        use IssueStatus::*;
        match self {
            Open => &[InProgress, Resolved, Escalated],
            InProgress => &[Resolved, Escalated],
            Escalated => &[InProgress, Resolved],
            Resolved => &[],
        }
    }

    pub fn can_transition(self, target: IssueStatus) -> bool {
        self.next_allowed().contains(&target)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "OPEN",
            IssueStatus::InProgress => "IN_PROGRESS",
            IssueStatus::Resolved => "RESOLVED",
            IssueStatus::Escalated => "ESCALATED",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_issue_transition(current: IssueStatus, target: IssueStatus) -> Result<(), AppError> {
    if current.can_transition(target) {
        Ok(())
    } else {
        Err(AppError::IllegalStatusTransition {
            from: current.to_string(),
            to: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn main_chain_is_linear_until_stored() {
        use BatchStatus::*;
        let chain = [
            Planted, Growing, ReadyForHarvest, Harvested, Processed, ReadyForPackaging,
            Packaging, Packaged, Shipped, Received, Stored,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Stored.is_terminal());
    }

    #[test]
    fn approval_branch() {
        use BatchStatus::*;
        assert!(Harvested.can_transition(PendingApproval));
        assert!(PendingApproval.can_transition(Processed));
        assert!(PendingApproval.can_transition(ReadyForHarvest));
        assert!(!PendingApproval.can_transition(Harvested));
    }

    #[test]
    fn received_accepts_packaged_or_shipped() {
        assert!(BatchStatus::Packaged.can_transition(BatchStatus::Received));
        assert!(BatchStatus::Shipped.can_transition(BatchStatus::Received));
        assert!(!BatchStatus::Packaging.can_transition(BatchStatus::Received));
    }

    #[test]
    fn packaging_to_stored_names_both_statuses() {
        let err = validate_batch_transition(BatchStatus::Packaging, BatchStatus::Stored).unwrap_err();
        match err {
            AppError::IllegalStatusTransition { from, to } => {
                assert_eq!(from, "PACKAGING");
                assert_eq!(to, "STORED");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn wire_names_match_serde() {
        for status in BatchStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for status in TransportStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn transport_terminal_states() {
        assert!(TransportStatus::Delivered.next_allowed().is_empty());
        assert!(TransportStatus::Cancelled.next_allowed().is_empty());
        assert!(validate_transport_transition(TransportStatus::Scheduled, TransportStatus::Delivered).is_err());
        assert!(validate_transport_transition(TransportStatus::InTransit, TransportStatus::Delivered).is_ok());
    }

    #[test]
    fn resolved_issue_is_closed() {
        assert!(validate_issue_transition(IssueStatus::Resolved, IssueStatus::Open).is_err());
        assert!(validate_issue_transition(IssueStatus::Escalated, IssueStatus::Resolved).is_ok());
    }

    fn any_batch_status() -> impl Strategy<Value = BatchStatus> {
        proptest::sample::select(BatchStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_validation_agrees_with_table(from in any_batch_status(), to in any_batch_status()) {
            let res = validate_batch_transition(from, to);
            prop_assert_eq!(res.is_ok(), from.next_allowed().contains(&to));
        }

        #[test]
        fn prop_no_self_loops(status in any_batch_status()) {
            prop_assert!(!status.can_transition(status));
        }
    }
}

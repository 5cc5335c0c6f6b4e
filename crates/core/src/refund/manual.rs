//! Manual refunds and proof documents.

use chrono::Utc;
use clinipay_shared::types::{PaymentId, RefundId};
use tracing::{error, info, warn};

use super::coordinator::{RefundCoordinator, build_commit, ensure_refundable, resolve_amount};
use super::error::RefundError;
use super::types::{
    Actor, ManualRefundRequest, ProofObject, ProofVerification, Refund, RefundMethod, SignedProof,
};
use crate::storage::{proof_key, sha256_hex};

impl RefundCoordinator {
    /// Records a refund executed outside the processor, backed by a proof
    /// document.
    ///
    /// The proof is stored and its URL minted before the commit; a failed
    /// commit deletes the object again.
    pub async fn refund_manual(
        &self,
        request: ManualRefundRequest,
        actor: &Actor,
    ) -> Result<SignedProof, RefundError> {
        self.authorize(actor)?;

        let payment = self.load_payment(request.payment_id).await?;
        ensure_refundable(&payment)?;
        self.ensure_no_open_discrepancy(payment.id).await?;
        let amount = resolve_amount(&payment, request.amount)?;

        let proof = request.proof;
        let size = u64::try_from(proof.bytes.len()).unwrap_or(u64::MAX);
        self.limits.validate(&proof.content_type, size)?;

        let refund_id = RefundId::new();
        let key = proof_key(payment.id, refund_id, &proof.file_name);
        let checksum = sha256_hex(&proof.bytes);

        self.proofs
            .put(&key, proof.bytes, &proof.content_type)
            .await?;

        let signed = match self.proofs.presign_read(&key, self.proof_url_ttl()).await {
            Ok(signed) => signed,
            Err(e) => {
                self.discard_proof(&key).await;
                return Err(e.into());
            }
        };

        let refund = Refund {
            id: refund_id,
            payment_id: payment.id,
            amount,
            method: RefundMethod::Manual,
            processor_refund_id: None,
            proof: Some(ProofObject {
                key: key.clone(),
                checksum_sha256: checksum,
                content_type: proof.content_type,
                size,
            }),
            actor_id: actor.user_id,
            reason: request.reason,
            created_at: Utc::now(),
        };
        let commit = build_commit(&payment, refund.clone(), request.cancel_booking);

        match self.refunds.commit_refund(&commit).await {
            Ok(true) => {
                info!(
                    payment_id = %payment.id,
                    refund_id = %refund.id,
                    user_id = %actor.user_id,
                    amount = %amount,
                    cancel_booking = request.cancel_booking,
                    "Manual refund committed"
                );
                Ok(SignedProof {
                    refund,
                    signed_url: signed.url,
                    expires_at: signed.expires_at,
                })
            }
            Ok(false) => {
                self.discard_proof(&key).await;
                Err(RefundError::ConcurrentModification(payment.id))
            }
            Err(e) => {
                self.discard_proof(&key).await;
                Err(e.into())
            }
        }
    }

    async fn discard_proof(&self, key: &str) {
        if let Err(e) = self.proofs.delete(key).await {
            error!(key, error = %e, "Failed to delete orphaned refund proof");
        }
    }

    /// Lists the refunds of a payment.
    pub async fn list_refunds(
        &self,
        payment_id: PaymentId,
        actor: &Actor,
    ) -> Result<Vec<Refund>, RefundError> {
        self.authorize(actor)?;
        self.load_payment(payment_id).await?;
        Ok(self.refunds.list_refunds(payment_id).await?)
    }

    async fn load_refund(&self, refund_id: RefundId) -> Result<(Refund, ProofObject), RefundError> {
        let refund = self
            .refunds
            .find_refund(refund_id)
            .await?
            .ok_or(RefundError::RefundNotFound(refund_id))?;
        let proof = refund
            .proof
            .clone()
            .ok_or(RefundError::ProofMissing(refund_id))?;
        Ok((refund, proof))
    }

    /// Mints a time-limited URL for a refund's proof document.
    ///
    /// The role check runs before any store or storage access.
    pub async fn proof_url(
        &self,
        refund_id: RefundId,
        actor: &Actor,
    ) -> Result<SignedProof, RefundError> {
        self.authorize(actor)?;

        let (refund, proof) = self.load_refund(refund_id).await?;
        let signed = self
            .proofs
            .presign_read(&proof.key, self.proof_url_ttl())
            .await?;

        info!(refund_id = %refund_id, user_id = %actor.user_id, "Issued refund proof URL");
        Ok(SignedProof {
            refund,
            signed_url: signed.url,
            expires_at: signed.expires_at,
        })
    }

    /// Re-reads a proof document and compares it with its stored checksum.
    pub async fn verify_proof(
        &self,
        refund_id: RefundId,
        actor: &Actor,
    ) -> Result<ProofVerification, RefundError> {
        self.authorize(actor)?;

        let (_, proof) = self.load_refund(refund_id).await?;
        let bytes = self.proofs.read(&proof.key).await?;
        let intact = sha256_hex(&bytes) == proof.checksum_sha256;

        if !intact {
            warn!(refund_id = %refund_id, key = %proof.key, "Refund proof checksum mismatch");
        }

        Ok(ProofVerification { refund_id, intact })
    }

    /// Marks a payment's open discrepancies resolved after manual
    /// reconciliation with the processor.
    pub async fn resolve_discrepancy(
        &self,
        payment_id: PaymentId,
        actor: &Actor,
    ) -> Result<u64, RefundError> {
        self.authorize(actor)?;
        self.load_payment(payment_id).await?;

        let resolved = self
            .refunds
            .resolve_discrepancies(payment_id, Utc::now())
            .await?;
        info!(
            payment_id = %payment_id,
            user_id = %actor.user_id,
            resolved,
            "Resolved refund discrepancies"
        );
        Ok(resolved)
    }
}

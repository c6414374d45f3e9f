use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Span};

use ftl_types::{Amount, ParticipantId, TokenId};

use crate::error::TokenError;

/// Holdings of one participant in one token.
///
/// `available` is the spendable balance; `locked` is held in escrow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub available: Amount,
    pub locked: Amount,
}

impl Position {
    /// Available plus locked. Bounded by the token's supply, so it cannot
    /// overflow for positions read from a ledger.
    pub fn total(&self) -> Amount {
        self.available.saturating_add(self.locked)
    }
}

/// In-memory token ledger: balances, escrow, allowances and supply.
pub struct TokenLedger {
    span: Span,
    inner: RwLock<TokenState>,
}

#[derive(Default)]
struct TokenState {
    accounts: HashMap<ParticipantId, HashMap<TokenId, Position>>,
    allowances: HashMap<(ParticipantId, ParticipantId, TokenId), Amount>,
    supply: HashMap<TokenId, Amount>,
}

impl TokenState {
    fn position(&self, participant: &ParticipantId, token: &TokenId) -> Position {
        self.accounts
            .get(participant)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or_default()
    }

    fn position_mut(&mut self, participant: &ParticipantId, token: &TokenId) -> &mut Position {
        self.accounts
            .entry(participant.clone())
            .or_default()
            .entry(token.clone())
            .or_default()
    }

    fn allowance(&self, owner: &ParticipantId, spender: &ParticipantId, token: &TokenId) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn supply(&self, token: &TokenId) -> Amount {
        self.supply.get(token).copied().unwrap_or(0)
    }

    fn require_available(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        required: Amount,
    ) -> Result<Position, TokenError> {
        let position = self.position(participant, token);
        if position.available < required {
            return Err(TokenError::InsufficientFunds {
                participant: participant.clone(),
                token: token.clone(),
                available: position.available,
                required,
            });
        }
        Ok(position)
    }

    /// Check a balance move without applying it. Returns the receiver's new
    /// available balance, or `None` for a self-transfer.
    fn check_move(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<Option<Amount>, TokenError> {
        self.require_available(from, token, amount)?;
        if from == to {
            return Ok(None);
        }
        self.position(to, token)
            .available
            .checked_add(amount)
            .map(Some)
            .ok_or_else(|| TokenError::overflow(token, "receiver balance"))
    }

    fn apply_move(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
        token: &TokenId,
        amount: Amount,
        credited: Option<Amount>,
    ) {
        if let Some(credited) = credited {
            self.position_mut(from, token).available -= amount;
            self.position_mut(to, token).available = credited;
        }
    }

    fn move_available(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let credited = self.check_move(from, to, token, amount)?;
        self.apply_move(from, to, token, amount, credited);
        Ok(())
    }
}

fn require_positive(operation: &str, amount: Amount) -> Result<(), TokenError> {
    if amount == 0 {
        return Err(TokenError::Validation(format!(
            "{operation} amount must be positive"
        )));
    }
    Ok(())
}

impl TokenLedger {
    pub fn new() -> Self {
        Self {
            span: info_span!("tokens"),
            inner: RwLock::new(TokenState::default()),
        }
    }

    /// Log ledger activity under `span` instead of the default `tokens` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, TokenState>, TokenError> {
        self.inner
            .read()
            .map_err(|_| TokenError::LockPoisoned("read"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, TokenState>, TokenError> {
        self.inner
            .write()
            .map_err(|_| TokenError::LockPoisoned("write"))
    }

    // ---- reads ----

    /// Available balance; unknown participant/token pairs read as zero.
    pub fn get_balance(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
    ) -> Result<Amount, TokenError> {
        Ok(self.read_state()?.position(participant, token).available)
    }

    pub fn escrowed(&self, participant: &ParticipantId, token: &TokenId) -> Result<Amount, TokenError> {
        Ok(self.read_state()?.position(participant, token).locked)
    }

    pub fn position(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
    ) -> Result<Position, TokenError> {
        Ok(self.read_state()?.position(participant, token))
    }

    pub fn allowance(
        &self,
        owner: &ParticipantId,
        spender: &ParticipantId,
        token: &TokenId,
    ) -> Result<Amount, TokenError> {
        Ok(self.read_state()?.allowance(owner, spender, token))
    }

    /// Sum of every balance and escrow in `token`.
    pub fn total_supply(&self, token: &TokenId) -> Result<Amount, TokenError> {
        Ok(self.read_state()?.supply(token))
    }

    /// Every position ever touched, including ones back at zero, in
    /// participant then token order.
    pub fn positions(&self) -> Result<BTreeMap<(ParticipantId, TokenId), Position>, TokenError> {
        let state = self.read_state()?;
        Ok(state
            .accounts
            .iter()
            .flat_map(|(participant, tokens)| {
                tokens
                    .iter()
                    .map(move |(token, position)| ((participant.clone(), token.clone()), *position))
            })
            .collect())
    }

    /// Supply of every token ever minted.
    pub fn supplies(&self) -> Result<BTreeMap<TokenId, Amount>, TokenError> {
        let state = self.read_state()?;
        Ok(state
            .supply
            .iter()
            .map(|(token, amount)| (token.clone(), *amount))
            .collect())
    }

    // ---- supply ----

    /// Credit `amount` new tokens to `participant`.
    pub fn mint(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        require_positive("mint", amount)?;

        let mut state = self.write_state()?;
        let supply = state
            .supply(token)
            .checked_add(amount)
            .ok_or_else(|| TokenError::overflow(token, "supply"))?;
        let available = state
            .position(participant, token)
            .available
            .checked_add(amount)
            .ok_or_else(|| TokenError::overflow(token, "balance"))?;

        state.supply.insert(token.clone(), supply);
        state.position_mut(participant, token).available = available;
        debug!(%participant, %token, amount, supply, "minted");
        Ok(())
    }

    /// Destroy `amount` of `participant`'s available balance.
    pub fn burn(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        require_positive("burn", amount)?;

        let mut state = self.write_state()?;
        state.require_available(participant, token, amount)?;
        // Supply covers every balance, so it holds at least `amount`.
        let supply = state.supply(token).saturating_sub(amount);

        state.supply.insert(token.clone(), supply);
        state.position_mut(participant, token).available -= amount;
        debug!(%participant, %token, amount, supply, "burned");
        Ok(())
    }

    // ---- transfers ----

    /// Move `amount` of available balance from `from` to `to`.
    ///
    /// A self-transfer checks funds and otherwise changes nothing.
    pub fn transfer(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        require_positive("transfer", amount)?;

        self.write_state()?.move_available(from, to, token, amount)?;
        debug!(%from, %to, %token, amount, "transferred");
        Ok(())
    }

    /// Set the allowance of `spender` over `owner`'s `token`, returning the
    /// previous allowance. Zero revokes.
    pub fn approve(
        &self,
        owner: &ParticipantId,
        spender: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        let _enter = self.span.enter();
        let mut state = self.write_state()?;
        let previous = state
            .allowances
            .insert((owner.clone(), spender.clone(), token.clone()), amount)
            .unwrap_or(0);
        debug!(%owner, %spender, %token, amount, previous, "allowance set");
        Ok(previous)
    }

    /// Move `amount` from `owner` to `to` on behalf of `spender`, consuming
    /// that much of the spender's allowance.
    pub fn transfer_from(
        &self,
        owner: &ParticipantId,
        spender: &ParticipantId,
        to: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        require_positive("transfer_from", amount)?;

        let mut state = self.write_state()?;
        let allowance = state.allowance(owner, spender, token);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                token: token.clone(),
                allowance,
                required: amount,
            });
        }

        state.move_available(owner, to, token, amount)?;
        state.allowances.insert(
            (owner.clone(), spender.clone(), token.clone()),
            allowance - amount,
        );
        debug!(%owner, %spender, %to, %token, amount, "transferred from allowance");
        Ok(())
    }

    /// Transfer several tokens at once. Every leg is checked before any is
    /// applied; one failing leg rejects the whole batch.
    pub fn batch_transfer(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        amounts: &BTreeMap<TokenId, Amount>,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        if amounts.is_empty() {
            return Err(TokenError::Validation("batch transfer is empty".into()));
        }
        for amount in amounts.values() {
            require_positive("batch_transfer", *amount)?;
        }

        let mut state = self.write_state()?;
        let legs = amounts
            .iter()
            .map(|(token, amount)| {
                state
                    .check_move(from, to, token, *amount)
                    .map(|credited| (token, *amount, credited))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (token, amount, credited) in legs {
            state.apply_move(from, to, token, amount, credited);
        }
        debug!(%from, %to, tokens = amounts.len(), "batch transferred");
        Ok(())
    }

    // ---- escrow ----

    /// Move `amount` from available balance into escrow.
    pub fn lock_escrow(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        require_positive("lock_escrow", amount)?;

        let mut state = self.write_state()?;
        let position = state.require_available(participant, token, amount)?;
        let locked = position
            .locked
            .checked_add(amount)
            .ok_or_else(|| TokenError::overflow(token, "escrow"))?;

        let slot = state.position_mut(participant, token);
        slot.available -= amount;
        slot.locked = locked;
        debug!(%participant, %token, amount, "escrow locked");
        Ok(())
    }

    /// Move `amount` from escrow back into available balance.
    pub fn release_escrow(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        self.unlock("release_escrow", participant, token, amount)?;
        debug!(%participant, %token, amount, "escrow released");
        Ok(())
    }

    /// Same balance effect as [`TokenLedger::release_escrow`]; recorded as a
    /// refund by callers that distinguish the two.
    pub fn refund_escrow(
        &self,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let _enter = self.span.enter();
        self.unlock("refund_escrow", participant, token, amount)?;
        debug!(%participant, %token, amount, "escrow refunded");
        Ok(())
    }

    fn unlock(
        &self,
        operation: &str,
        participant: &ParticipantId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        require_positive(operation, amount)?;

        let mut state = self.write_state()?;
        let position = state.position(participant, token);
        if position.locked < amount {
            return Err(TokenError::InsufficientEscrow {
                participant: participant.clone(),
                token: token.clone(),
                locked: position.locked,
                required: amount,
            });
        }
        let available = position
            .available
            .checked_add(amount)
            .ok_or_else(|| TokenError::overflow(token, "balance"))?;

        let slot = state.position_mut(participant, token);
        slot.locked -= amount;
        slot.available = available;
        Ok(())
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

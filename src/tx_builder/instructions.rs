//! Instruction planning and ordering validation
//!
//! Every trade assembles into the same fixed shape:
//! 1. associated token account creation (only for accounts missing on chain)
//! 2. WSOL top-up: system transfer + `sync_native`
//! 3. the swap instruction, exactly once
//! 4. unwrap/close of token accounts
//! 5. optional tip transfer
//!
//! Later stages depend on side effects of earlier ones, so [`InstructionPlan`]
//! refuses out-of-order pushes instead of sorting.

use crate::constants::SYSTEM_PROGRAM_ID;
use crate::tx_builder::errors::{TradeError, TradeResult};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction,
};
use spl_associated_token_account::instruction::create_associated_token_account;

/// Position of an instruction in the assembled list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    CreateAta,
    Wrap,
    Swap,
    Unwrap,
    Tip,
}

/// Plan of instructions with ordering metadata
#[derive(Debug, Clone, Default)]
pub struct InstructionPlan {
    entries: Vec<(Stage, Instruction)>,
}

impl InstructionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at `stage`; stages must be non-decreasing and the swap unique
    pub fn push(&mut self, stage: Stage, instruction: Instruction) -> TradeResult<()> {
        if let Some((last, _)) = self.entries.last() {
            if stage < *last {
                return Err(TradeError::invalid_order(format!(
                    "{:?} instruction after {:?}",
                    stage, last
                )));
            }
            if stage == Stage::Swap && *last == Stage::Swap {
                return Err(TradeError::invalid_order("swap instruction added twice"));
            }
        }
        self.entries.push((stage, instruction));
        Ok(())
    }

    pub fn extend(
        &mut self,
        stage: Stage,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> TradeResult<()> {
        for ix in instructions {
            self.push(stage, ix)?;
        }
        Ok(())
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.entries.iter().map(|(s, _)| *s).collect()
    }

    /// Final list; fails if no swap was planned
    pub fn into_instructions(self) -> TradeResult<Vec<Instruction>> {
        let swaps = self
            .entries
            .iter()
            .filter(|(s, _)| *s == Stage::Swap)
            .count();
        if swaps != 1 {
            return Err(TradeError::invalid_order(format!(
                "expected exactly one swap instruction, found {}",
                swaps
            )));
        }
        let instructions: Vec<Instruction> =
            self.entries.into_iter().map(|(_, ix)| ix).collect();
        sanity_check_ix_order(&instructions)?;
        Ok(instructions)
    }
}

/// Create `wallet`'s associated token account for `mint`, paid by `payer`
pub fn create_ata(payer: &Pubkey, wallet: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Instruction {
    create_associated_token_account(payer, wallet, mint, token_program)
}

/// Transfer `lamports` into a WSOL account and sync its token amount
///
/// `token_program` owns the account. Empty for a zero top-up.
pub fn wrap_sol(
    payer: &Pubkey,
    wsol_account: &Pubkey,
    token_program: &Pubkey,
    lamports: u64,
) -> Vec<Instruction> {
    if lamports == 0 {
        return Vec::new();
    }
    vec![
        system_instruction::transfer(payer, wsol_account, lamports),
        sync_native(wsol_account, token_program),
    ]
}

/// `sync_native` (instruction 17) for either token program
fn sync_native(account: &Pubkey, token_program: &Pubkey) -> Instruction {
    Instruction {
        program_id: *token_program,
        accounts: vec![AccountMeta::new(*account, false)],
        data: vec![17],
    }
}

/// `close_account` (instruction 9) for either token program
pub fn close_account(
    account: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *token_program,
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: vec![9],
    }
}

/// Tip transfer to a relay account
pub fn tip(payer: &Pubkey, tip_account: &Pubkey, lamports: u64) -> Instruction {
    system_instruction::transfer(payer, tip_account, lamports)
}

fn is_system_transfer(ix: &Instruction) -> bool {
    ix.program_id == SYSTEM_PROGRAM_ID && ix.data.len() >= 4 && ix.data[..4] == [2, 0, 0, 0]
}

/// Validate instruction ordering (debug/test only)
///
/// Checks that there is exactly one venue instruction, every `sync_native`
/// precedes it directly after its transfer, and every close follows it.
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> TradeResult<()> {
    use crate::constants::{PUMP_AMM_PROGRAM_ID, PUMP_PROGRAM_ID};

    if instructions.is_empty() {
        return Err(TradeError::invalid_order("Instruction list is empty"));
    }

    let swap_positions: Vec<usize> = instructions
        .iter()
        .enumerate()
        .filter(|(_, ix)| ix.program_id == PUMP_PROGRAM_ID || ix.program_id == PUMP_AMM_PROGRAM_ID)
        .map(|(i, _)| i)
        .collect();
    let swap_at = match swap_positions.as_slice() {
        [single] => *single,
        other => {
            return Err(TradeError::invalid_order(format!(
                "expected one venue instruction, found {}",
                other.len()
            )))
        }
    };

    for (idx, ix) in instructions.iter().enumerate() {
        let is_token_ix = crate::constants::is_token_program(&ix.program_id);
        if is_token_ix && ix.data.first() == Some(&17) {
            if idx > swap_at {
                return Err(TradeError::invalid_order(format!(
                    "sync_native at position {} after swap at {}",
                    idx, swap_at
                )));
            }
            if idx == 0 || !is_system_transfer(&instructions[idx - 1]) {
                return Err(TradeError::invalid_order(format!(
                    "sync_native at position {} is not preceded by a transfer",
                    idx
                )));
            }
        }
        if is_token_ix && ix.data.first() == Some(&9) && idx < swap_at {
            return Err(TradeError::invalid_order(format!(
                "close_account at position {} before swap at {}",
                idx, swap_at
            )));
        }
    }

    Ok(())
}

/// No-op version of sanity_check_ix_order for release builds
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(_instructions: &[Instruction]) -> TradeResult<()> {
    Ok(())
}

//! Human-readable rendering of dry-run failures

use crate::tx_builder::errors::TradeError;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;

/// Which program's error table applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    BondingCurve,
    Pool,
}

impl Venue {
    pub fn program_name(&self) -> &'static str {
        match self {
            Venue::BondingCurve => "pump",
            Venue::Pool => "pump_amm",
        }
    }

    /// Custom error entry from the program's IDL
    pub fn idl_error(&self, code: u32) -> Option<&'static IdlError> {
        let table = match self {
            Venue::BondingCurve => PUMP_ERRORS,
            Venue::Pool => PUMP_AMM_ERRORS,
        };
        table.iter().find(|e| e.code == code)
    }

    /// Custom error name from the program's IDL
    pub fn error_name(&self, code: u32) -> Option<&'static str> {
        self.idl_error(code).map(|e| e.name)
    }
}

/// One `errors` entry of an Anchor IDL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlError {
    pub code: u32,
    pub name: &'static str,
    pub msg: Option<&'static str>,
}

macro_rules! idl_errors {
    (@msg $msg:literal) => { Some($msg) };
    (@msg) => { None };
    ($($code:literal => $name:ident $(: $msg:literal)?),* $(,)?) => {
        &[$(IdlError {
            code: $code,
            name: stringify!($name),
            msg: idl_errors!(@msg $($msg)?),
        }),*]
    };
}

const PUMP_ERRORS: &[IdlError] = idl_errors! {
    6000 => NotAuthorized: "The given account is not authorized to execute this instruction.",
    6001 => AlreadyInitialized: "The program is already initialized.",
    6002 => TooMuchSolRequired: "slippage: Too much SOL required to buy the given amount of tokens.",
    6003 => TooLittleSolReceived: "slippage: Too little SOL received to sell the given amount of tokens.",
    6004 => MintDoesNotMatchBondingCurve: "The mint does not match the bonding curve.",
    6005 => BondingCurveComplete: "The bonding curve has completed and liquidity migrated to raydium.",
    6006 => BondingCurveNotComplete: "The bonding curve has not completed.",
    6007 => NotInitialized: "The program is not initialized.",
    6008 => WithdrawTooFrequent: "Withdraw too frequent",
    6009 => NewSizeShouldBeGreaterThanCurrentSize,
    6010 => AccountTypeNotSupported,
    6011 => InitialRealTokenReservesShouldBeLessThanTokenTotalSupply,
    6012 => InitialVirtualTokenReservesShouldBeGreaterThanRealTokenReserves,
    6013 => FeeBasisPointsGreaterThanMaximum,
    6014 => AllZerosWithdrawAuthority,
    6015 => PoolMigrationFeeShouldBeLessThanFinalRealSolReserves,
    6016 => PoolMigrationFeeShouldBeGreaterThanCreatorFeePlusMaxMigrateFees,
    6017 => DisabledWithdraw,
    6018 => DisabledMigrate,
    6019 => InvalidCreator,
    6020 => BuyZeroAmount,
    6021 => NotEnoughTokensToBuy,
    6022 => SellZeroAmount,
    6023 => NotEnoughTokensToSell,
    6024 => Overflow,
    6025 => Truncation,
    6026 => DivisionByZero,
    6027 => NotEnoughRemainingAccounts,
    6028 => AllFeeRecipientsShouldBeNonZero,
    6029 => UnsortedNotUniqueFeeRecipients,
    6030 => CreatorShouldNotBeZero,
    6031 => StartTimeInThePast,
    6032 => EndTimeInThePast,
    6033 => EndTimeBeforeStartTime,
    6034 => TimeRangeTooLarge,
    6035 => EndTimeBeforeCurrentDay,
    6036 => SupplyUpdateForFinishedRange,
    6037 => DayIndexAfterEndIndex,
    6038 => DayInActiveRange,
    6039 => InvalidIncentiveMint,
    6040 => BuyNotEnoughSolToCoverRent,
    6041 => BuyNotEnoughSolToCoverFees,
    6042 => BuySlippageBelowMinTokensOut,
    6043 => NameTooLong,
    6044 => SymbolTooLong,
    6045 => UriTooLong,
    6046 => CreateV2Disabled,
    6047 => CpitializeMayhemFailed,
    6048 => MayhemModeDisabled,
};

const PUMP_AMM_ERRORS: &[IdlError] = idl_errors! {
    6000 => FeeBasisPointsExceedsMaximum,
    6001 => ZeroBaseAmount,
    6002 => ZeroQuoteAmount,
    6003 => TooLittlePoolTokenLiquidity,
    6004 => ExceededSlippage,
    6005 => InvalidAdmin,
    6006 => UnsupportedBaseMint,
    6007 => UnsupportedQuoteMint,
    6008 => InvalidBaseMint,
    6009 => InvalidQuoteMint,
    6010 => InvalidLpMint,
    6011 => AllProtocolFeeRecipientsShouldBeNonZero,
    6012 => UnsortedNotUniqueProtocolFeeRecipients,
    6013 => InvalidProtocolFeeRecipient,
    6014 => InvalidPoolBaseTokenAccount,
    6015 => InvalidPoolQuoteTokenAccount,
    6016 => BuyMoreBaseAmountThanPoolReserves,
    6017 => DisabledCreatePool,
    6018 => DisabledDeposit,
    6019 => DisabledWithdraw,
    6020 => DisabledBuy,
    6021 => DisabledSell,
    6022 => SameMint,
    6023 => Overflow,
    6024 => Truncation,
    6025 => DivisionByZero,
    6026 => NewSizeLessThanCurrentSize,
    6027 => AccountTypeNotSupported,
    6028 => OnlyCanonicalPumpPoolsCanHaveCoinCreator,
    6029 => InvalidAdminSetCoinCreatorAuthority,
    6030 => StartTimeInThePast,
    6031 => EndTimeInThePast,
    6032 => EndTimeBeforeStartTime,
    6033 => TimeRangeTooLarge,
    6034 => EndTimeBeforeCurrentDay,
    6035 => SupplyUpdateForFinishedRange,
    6036 => DayIndexAfterEndIndex,
    6037 => DayInActiveRange,
    6038 => InvalidIncentiveMint,
    6039 => BuyNotEnoughQuoteTokensToCoverFees,
    6040 => BuySlippageBelowMinBaseAmountOut,
    6041 => MayhemModeDisabled,
    6042 => OnlyPumpPoolsMayhemMode,
    6043 => MayhemModeInDesiredState,
    6044 => NotEnoughRemainingAccounts,
};

const ANCHOR_ACCOUNT_NOT_INITIALIZED: u32 = 3012;
const ANCHOR_CONSTRAINT_TOKEN_TOKEN_PROGRAM: u32 = 2023;
const ANCHOR_INVALID_PROGRAM_ID: u32 = 3008;
const NOT_ENOUGH_TOKENS_TO_SELL: u32 = 6023;

/// Turn a structured simulation error into a [`TradeError`]
pub fn decode_simulation_error(venue: Venue, err: &TransactionError, logs: &[String]) -> TradeError {
    if let TransactionError::InstructionError(_, InstructionError::Custom(code)) = err {
        let account = account_from_logs(logs);
        return TradeError::ProgramError {
            program: venue.program_name(),
            code: *code,
            message: describe_code(venue, *code, account),
            logs: logs.to_vec(),
        };
    }

    TradeError::Simulation {
        reason: err.to_string(),
        logs: logs.to_vec(),
    }
}

/// Account named by an Anchor "caused by account: X." log line
pub fn account_from_logs(logs: &[String]) -> Option<&str> {
    const MARKER: &str = "caused by account: ";
    logs.iter().find_map(|line| {
        let start = line.find(MARKER)? + MARKER.len();
        let rest = &line[start..];
        Some(match rest.find('.') {
            Some(end) => &rest[..end],
            None => rest,
        })
    })
}

fn describe_code(venue: Venue, code: u32, account: Option<&str>) -> String {
    match code {
        ANCHOR_ACCOUNT_NOT_INITIALIZED => {
            return match account {
                Some(name) => format!(
                    "account '{}' not initialized (create the account first)",
                    name
                ),
                None => "account not initialized".to_string(),
            }
        }
        ANCHOR_CONSTRAINT_TOKEN_TOKEN_PROGRAM => {
            return "token program constraint violated (wrong token program for mint)".to_string()
        }
        ANCHOR_INVALID_PROGRAM_ID => {
            return "program ID was not as expected (wrong program)".to_string()
        }
        _ => {}
    }

    match venue.idl_error(code) {
        Some(entry) => {
            let message = match entry.msg {
                Some(msg) => msg.to_string(),
                None => readable(entry.name),
            };
            match account {
                Some(acc) if code == NOT_ENOUGH_TOKENS_TO_SELL => {
                    format!("{} (account: {})", message, acc)
                }
                _ => message,
            }
        }
        None => format!("error code {}", code),
    }
}

/// `TooMuchSolRequired` -> `Too Much Sol Required`
fn readable(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(code: u32) -> TransactionError {
        TransactionError::InstructionError(2, InstructionError::Custom(code))
    }

    #[test]
    fn test_not_initialized_names_account() {
        let logs = vec![
            "Program log: AnchorError caused by account: user_base_token_account. Error Code: AccountNotInitialized.".to_string(),
        ];
        let err = decode_simulation_error(Venue::Pool, &custom(3012), &logs);
        match err {
            TradeError::ProgramError { code, message, logs, .. } => {
                assert_eq!(code, 3012);
                assert_eq!(
                    message,
                    "account 'user_base_token_account' not initialized (create the account first)"
                );
                assert_eq!(logs.len(), 1);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let err = decode_simulation_error(Venue::Pool, &custom(3012), &[]);
        assert!(err.to_string().ends_with("account not initialized"));
    }

    #[test]
    fn test_wrong_token_program() {
        let err = decode_simulation_error(Venue::BondingCurve, &custom(2023), &[]);
        assert!(err
            .to_string()
            .contains("token program constraint violated (wrong token program for mint)"));
    }

    #[test]
    fn test_venue_tables() {
        let err = decode_simulation_error(Venue::Pool, &custom(6004), &[]);
        assert_eq!(err.to_string(), "program pump_amm error [6004]: Exceeded Slippage");

        let err = decode_simulation_error(Venue::BondingCurve, &custom(6002), &[]);
        assert_eq!(
            err.to_string(),
            "program pump error [6002]: slippage: Too much SOL required to buy the given amount of tokens."
        );

        let err = decode_simulation_error(Venue::BondingCurve, &custom(6999), &[]);
        assert!(err.to_string().ends_with("error code 6999"));
    }

    #[test]
    fn test_full_idl_tables() {
        let err = decode_simulation_error(Venue::BondingCurve, &custom(6042), &[]);
        assert_eq!(
            err.to_string(),
            "program pump error [6042]: Buy Slippage Below Min Tokens Out"
        );

        let err = decode_simulation_error(Venue::Pool, &custom(6040), &[]);
        assert_eq!(
            err.to_string(),
            "program pump_amm error [6040]: Buy Slippage Below Min Base Amount Out"
        );
        assert_eq!(Venue::Pool.error_name(6016), Some("BuyMoreBaseAmountThanPoolReserves"));
        assert_eq!(Venue::BondingCurve.error_name(6023), Some("NotEnoughTokensToSell"));
    }

    #[test]
    fn test_tables_are_contiguous() {
        for table in [PUMP_ERRORS, PUMP_AMM_ERRORS] {
            for (i, entry) in table.iter().enumerate() {
                assert_eq!(entry.code, 6000 + i as u32, "{}", entry.name);
            }
        }
    }

    #[test]
    fn test_not_enough_tokens_carries_account() {
        let logs = vec!["AnchorError caused by account: associated_user".to_string()];
        let err = decode_simulation_error(Venue::BondingCurve, &custom(6023), &logs);
        assert!(err
            .to_string()
            .ends_with("Not Enough Tokens To Sell (account: associated_user)"));
    }

    #[test]
    fn test_non_custom_error_is_generic() {
        let err = decode_simulation_error(
            Venue::Pool,
            &TransactionError::InsufficientFundsForFee,
            &["log".to_string()],
        );
        assert!(matches!(err, TradeError::Simulation { .. }));
        assert_eq!(err.logs().len(), 1);
    }
}

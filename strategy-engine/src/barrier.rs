//! Default barrier selection per contract type

use common::{Barrier, ContractType, Digit};

/// Default barrier for `contract_type`, drawing DIGITDIFF digits from a fresh RNG
pub fn default_barrier(contract_type: ContractType) -> Option<Barrier> {
    default_barrier_with(contract_type, &mut fastrand::Rng::new())
}

/// Default barrier using the caller's RNG.
///
/// - CALL / PUT: no barrier
/// - DIGITEVEN / DIGITODD: the `EVEN` / `ODD` token
/// - DIGITDIFF: a uniformly random digit
/// - DIGITOVER_n / DIGITUNDER_n: `n`
/// - DIGITOVER / DIGITUNDER: [`common::DEFAULT_OVER_UNDER_DIGIT`]
pub fn default_barrier_with(
    contract_type: ContractType,
    rng: &mut fastrand::Rng,
) -> Option<Barrier> {
    match contract_type {
        ContractType::Call | ContractType::Put => None,
        ContractType::DigitEven => Some(Barrier::Even),
        ContractType::DigitOdd => Some(Barrier::Odd),
        ContractType::DigitDiff => Digit::new(rng.u8(0..=9)).ok().map(Barrier::Digit),
        ContractType::DigitOver(_) | ContractType::DigitUnder(_) => {
            contract_type.resolved().digit().map(Barrier::Digit)
        }
    }
}

/// Whether `barrier` is acceptable for `contract_type`
pub fn barrier_matches(contract_type: ContractType, barrier: Barrier) -> bool {
    match (contract_type, barrier) {
        (ContractType::Call | ContractType::Put, _) => false,
        (ContractType::DigitEven, Barrier::Even) => true,
        (ContractType::DigitOdd, Barrier::Odd) => true,
        (ContractType::DigitDiff, Barrier::Digit(_)) => true,
        (ContractType::DigitOver(None) | ContractType::DigitUnder(None), Barrier::Digit(_)) => true,
        (
            ContractType::DigitOver(Some(n)) | ContractType::DigitUnder(Some(n)),
            Barrier::Digit(d),
        ) => n == d,
        _ => false,
    }
}

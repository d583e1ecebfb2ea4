use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_core::{
    AccountId, Entity, JournalEntryId, Money, Sequences, StoreResult, ValueObject, format_number,
};

use crate::account::Side;
use crate::error::{JournalError, LedgerError};
use crate::ledger::{AccountRows, LedgerStore};

/// One side of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub side: Side,
    /// Strictly positive.
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            side: Side::Debit,
            amount,
            memo: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            side: Side::Credit,
            amount,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Debit-positive amount.
    pub fn signed_amount(&self) -> Money {
        self.side.signed(self.amount)
    }

    /// Same line on the opposite side.
    pub fn flipped(&self) -> Self {
        Self {
            side: self.side.flipped(),
            ..self.clone()
        }
    }
}

impl ValueObject for JournalLine {}

/// Sum of debit and credit amounts of a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineTotals {
    pub debits: Money,
    pub credits: Money,
}

impl LineTotals {
    pub fn is_balanced(&self) -> bool {
        self.debits == self.credits
    }
}

/// A posted journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub number: String,
    pub date: NaiveDate,
    pub memo: String,
    pub lines: Vec<JournalLine>,
    pub created_at: DateTime<Utc>,
    /// Set on reversal entries: the entry this one cancels.
    pub reverses: Option<JournalEntryId>,
    /// Set on entries that have been reversed.
    pub reversed_by: Option<JournalEntryId>,
}

impl JournalEntry {
    pub fn totals(&self) -> LineTotals {
        let mut totals = LineTotals::default();
        for line in &self.lines {
            match line.side {
                Side::Debit => totals.debits += line.amount,
                Side::Credit => totals.credits += line.amount,
            }
        }
        totals
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed_by.is_some()
    }
}

impl Entity for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn natural_key(&self) -> Option<String> {
        Some(self.number.clone())
    }
}

/// Input for posting an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    pub memo: String,
    pub lines: Vec<JournalLine>,
}

impl NewJournalEntry {
    pub fn new(date: NaiveDate, memo: impl Into<String>) -> Self {
        Self {
            date,
            memo: memo.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: JournalLine) -> Self {
        self.lines.push(line);
        self
    }
}

/// Persistence port for journal entries.
pub trait JournalRows {
    fn entry(&mut self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>>;

    fn entry_by_number(&mut self, number: &str) -> StoreResult<Option<JournalEntry>>;

    /// Insert or replace.
    fn save_entry(&mut self, entry: JournalEntry) -> StoreResult<()>;

    fn remove_entry(&mut self, id: JournalEntryId) -> StoreResult<()>;
}

/// How entry numbers are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryNumbering {
    pub prefix: String,
    pub width: usize,
}

impl Default for EntryNumbering {
    fn default() -> Self {
        Self {
            prefix: "JE".to_string(),
            width: 6,
        }
    }
}

impl EntryNumbering {
    /// Sequence series backing this prefix.
    pub fn series(&self) -> String {
        format!("journal:{}", self.prefix)
    }
}

/// Turns balanced line sets into posted entries and keeps the ledger in step.
///
/// Every method either applies its whole balance effect or none of it: all
/// touched accounts are checked before the first balance is written.
#[derive(Debug, Clone, Default)]
pub struct PostingEngine {
    ledger: LedgerStore,
    numbering: EntryNumbering,
}

impl PostingEngine {
    pub fn new(ledger: LedgerStore, numbering: EntryNumbering) -> Self {
        Self { ledger, numbering }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn numbering(&self) -> &EntryNumbering {
        &self.numbering
    }

    /// Structural checks that need no store access.
    pub fn validate_lines(lines: &[JournalLine]) -> Result<LineTotals, JournalError> {
        if lines.is_empty() {
            return Err(JournalError::EmptyEntry);
        }

        let mut totals = LineTotals::default();
        for (index, line) in lines.iter().enumerate() {
            if !line.amount.is_positive() {
                return Err(JournalError::ZeroAmountLine {
                    index,
                    amount: line.amount,
                });
            }
            let slot = match line.side {
                Side::Debit => &mut totals.debits,
                Side::Credit => &mut totals.credits,
            };
            *slot = slot
                .checked_add(line.amount)
                .ok_or(LedgerError::AmountOverflow)?;
        }

        if !totals.is_balanced() {
            return Err(JournalError::Unbalanced {
                debits: totals.debits,
                credits: totals.credits,
            });
        }
        Ok(totals)
    }

    /// Structural checks plus account existence and activity.
    pub fn validate<R>(&self, rows: &mut R, lines: &[JournalLine]) -> Result<LineTotals, JournalError>
    where
        R: AccountRows + ?Sized,
    {
        let totals = Self::validate_lines(lines)?;
        for line in lines {
            let account = rows
                .account(line.account_id)?
                .ok_or(JournalError::UnknownAccountReference(line.account_id))?;
            if !account.active {
                return Err(JournalError::InactiveAccountReference(line.account_id));
            }
        }
        Ok(totals)
    }

    pub fn post<R>(
        &self,
        rows: &mut R,
        new: NewJournalEntry,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, JournalError>
    where
        R: AccountRows + JournalRows + Sequences + ?Sized,
    {
        self.validate(rows, &new.lines)?;
        let deltas = net_deltas(new.lines.iter().map(|l| (l.account_id, l.signed_amount())))?;
        self.apply_deltas(rows, &deltas)?;

        let value = rows.next_value(&self.numbering.series())?;
        let entry = JournalEntry {
            id: JournalEntryId::new(),
            number: format_number(&self.numbering.prefix, value, self.numbering.width),
            date: new.date,
            memo: new.memo,
            lines: new.lines,
            created_at: now,
            reverses: None,
            reversed_by: None,
        };
        rows.save_entry(entry.clone())?;

        debug!(
            entry_id = %entry.id,
            number = %entry.number,
            lines = entry.lines.len(),
            "journal entry posted"
        );
        Ok(entry)
    }

    /// Post the mirror image of an entry. Reversing a reversal is allowed.
    pub fn reverse<R>(
        &self,
        rows: &mut R,
        entry_id: JournalEntryId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, JournalError>
    where
        R: AccountRows + JournalRows + Sequences + ?Sized,
    {
        let mut original = self.entry(rows, entry_id)?;
        if original.is_reversed() {
            return Err(JournalError::AlreadyReversed(entry_id));
        }

        let mut new = NewJournalEntry::new(date, format!("Reversal of {}", original.number));
        new.lines = original.lines.iter().map(JournalLine::flipped).collect();

        let mut reversal = self.post(rows, new, now)?;
        reversal.reverses = Some(original.id);
        rows.save_entry(reversal.clone())?;

        original.reversed_by = Some(reversal.id);
        rows.save_entry(original)?;

        debug!(entry_id = %entry_id, reversal_id = %reversal.id, "journal entry reversed");
        Ok(reversal)
    }

    /// Replace the lines (and optionally the memo) of an entry.
    ///
    /// The old effect is backed out and the new one applied as a single net
    /// delta per account. Entries that are reversed or are reversals cannot
    /// be edited.
    pub fn update<R>(
        &self,
        rows: &mut R,
        entry_id: JournalEntryId,
        lines: Vec<JournalLine>,
        memo: Option<String>,
    ) -> Result<JournalEntry, JournalError>
    where
        R: AccountRows + JournalRows + ?Sized,
    {
        let mut entry = self.entry(rows, entry_id)?;
        if entry.is_reversed() || entry.reverses.is_some() {
            return Err(JournalError::AlreadyReversed(entry_id));
        }
        self.validate(rows, &lines)?;

        let backed_out = entry
            .lines
            .iter()
            .map(|l| (l.account_id, -l.signed_amount()));
        let applied = lines.iter().map(|l| (l.account_id, l.signed_amount()));
        let deltas = net_deltas(backed_out.chain(applied))?;
        self.apply_deltas(rows, &deltas)?;

        entry.lines = lines;
        if let Some(memo) = memo {
            entry.memo = memo;
        }
        rows.save_entry(entry.clone())?;

        debug!(entry_id = %entry.id, number = %entry.number, "journal entry updated");
        Ok(entry)
    }

    /// Remove an entry and back out its balance effect.
    ///
    /// A reversed entry must lose its reversal first. Deleting a reversal
    /// re-opens the original for reversal.
    pub fn delete<R>(&self, rows: &mut R, entry_id: JournalEntryId) -> Result<JournalEntry, JournalError>
    where
        R: AccountRows + JournalRows + ?Sized,
    {
        let entry = self.entry(rows, entry_id)?;
        if entry.is_reversed() {
            return Err(JournalError::AlreadyReversed(entry_id));
        }

        let deltas = net_deltas(entry.lines.iter().map(|l| (l.account_id, -l.signed_amount())))?;
        self.apply_deltas(rows, &deltas)?;

        if let Some(original_id) = entry.reverses {
            if let Some(mut original) = rows.entry(original_id)? {
                original.reversed_by = None;
                rows.save_entry(original)?;
            }
        }
        rows.remove_entry(entry_id)?;

        debug!(entry_id = %entry.id, number = %entry.number, "journal entry deleted");
        Ok(entry)
    }

    pub fn entry<R>(&self, rows: &mut R, entry_id: JournalEntryId) -> Result<JournalEntry, JournalError>
    where
        R: JournalRows + ?Sized,
    {
        rows.entry(entry_id)?
            .ok_or(JournalError::EntryNotFound(entry_id))
    }

    /// Check every account can take its delta, then write them all.
    fn apply_deltas<R>(&self, rows: &mut R, deltas: &[(AccountId, Money)]) -> Result<(), JournalError>
    where
        R: AccountRows + ?Sized,
    {
        for (account_id, delta) in deltas {
            let account = rows
                .account(*account_id)?
                .ok_or(JournalError::UnknownAccountReference(*account_id))?;
            if !account.active {
                return Err(JournalError::InactiveAccountReference(*account_id));
            }
            account
                .balance_after(*delta)
                .ok_or(LedgerError::AmountOverflow)?;
        }
        for (account_id, delta) in deltas {
            self.ledger.post_balance_delta(rows, *account_id, *delta)?;
        }
        Ok(())
    }
}

/// Net debit-positive delta per account, first-seen order, zero nets dropped.
fn net_deltas(
    signed: impl Iterator<Item = (AccountId, Money)>,
) -> Result<Vec<(AccountId, Money)>, JournalError> {
    let mut deltas: Vec<(AccountId, Money)> = Vec::new();
    for (account_id, amount) in signed {
        match deltas.iter_mut().find(|(id, _)| *id == account_id) {
            Some((_, total)) => {
                *total = total
                    .checked_add(amount)
                    .ok_or(LedgerError::AmountOverflow)?;
            }
            None => deltas.push((account_id, amount)),
        }
    }
    deltas.retain(|(_, delta)| !delta.is_zero());
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, NewAccount};
    use crate::testing::MemoryBooks;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn open(books: &mut MemoryBooks, code: &str, account_type: AccountType) -> AccountId {
        LedgerStore
            .create_account(books, NewAccount::new(code, code, account_type), Utc::now())
            .unwrap()
            .id
    }

    fn balance(books: &mut MemoryBooks, id: AccountId) -> Money {
        LedgerStore.get_balance(books, id).unwrap()
    }

    fn cents(v: i64) -> Money {
        Money::from_minor(v)
    }

    #[test]
    fn cash_sale_moves_both_accounts_up() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let revenue = open(&mut books, "4000", AccountType::Revenue);
        let engine = PostingEngine::default();

        let entry = engine
            .post(
                &mut books,
                NewJournalEntry::new(date(), "Cash sale")
                    .line(JournalLine::debit(cash, cents(50_000)))
                    .line(JournalLine::credit(revenue, cents(50_000))),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(entry.number, "JE-000001");
        assert_eq!(entry.totals().debits, cents(50_000));
        assert_eq!(balance(&mut books, cash), cents(50_000));
        assert_eq!(balance(&mut books, revenue), cents(50_000));
    }

    #[test]
    fn numbers_are_sequential() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let equity = open(&mut books, "3000", AccountType::Equity);
        let engine = PostingEngine::default();

        let numbers: Vec<String> = (0..3)
            .map(|_| {
                engine
                    .post(
                        &mut books,
                        NewJournalEntry::new(date(), "capital")
                            .line(JournalLine::debit(cash, cents(100)))
                            .line(JournalLine::credit(equity, cents(100))),
                        Utc::now(),
                    )
                    .unwrap()
                    .number
            })
            .collect();

        assert_eq!(numbers, vec!["JE-000001", "JE-000002", "JE-000003"]);
    }

    #[test]
    fn unbalanced_lines_are_rejected_without_effect() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let revenue = open(&mut books, "4000", AccountType::Revenue);

        let err = PostingEngine::default()
            .post(
                &mut books,
                NewJournalEntry::new(date(), "typo")
                    .line(JournalLine::debit(cash, cents(10_000)))
                    .line(JournalLine::credit(revenue, cents(9_000))),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(
            err,
            JournalError::Unbalanced {
                debits: cents(10_000),
                credits: cents(9_000)
            }
        );
        assert_eq!(balance(&mut books, cash), Money::ZERO);
        assert_eq!(balance(&mut books, revenue), Money::ZERO);
    }

    #[test]
    fn structural_checks() {
        let a = AccountId::new();
        assert_eq!(PostingEngine::validate_lines(&[]), Err(JournalError::EmptyEntry));
        assert_eq!(
            PostingEngine::validate_lines(&[
                JournalLine::debit(a, cents(100)),
                JournalLine::credit(a, Money::ZERO),
            ]),
            Err(JournalError::ZeroAmountLine {
                index: 1,
                amount: Money::ZERO
            })
        );
        assert_eq!(
            PostingEngine::validate_lines(&[JournalLine::debit(a, cents(-5))]),
            Err(JournalError::ZeroAmountLine {
                index: 0,
                amount: cents(-5)
            })
        );
    }

    #[test]
    fn inactive_account_reference_leaves_balances_alone() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let old = open(&mut books, "4900", AccountType::Revenue);
        LedgerStore.deactivate_account(&mut books, old).unwrap();

        let err = PostingEngine::default()
            .post(
                &mut books,
                NewJournalEntry::new(date(), "bad")
                    .line(JournalLine::debit(cash, cents(100)))
                    .line(JournalLine::credit(old, cents(100))),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, JournalError::InactiveAccountReference(old));
        assert_eq!(balance(&mut books, cash), Money::ZERO);
    }

    #[test]
    fn unknown_account_reference_is_rejected() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let ghost = AccountId::new();

        let err = PostingEngine::default()
            .post(
                &mut books,
                NewJournalEntry::new(date(), "bad")
                    .line(JournalLine::debit(cash, cents(100)))
                    .line(JournalLine::credit(ghost, cents(100))),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, JournalError::UnknownAccountReference(ghost));
        assert_eq!(books.entry_count(), 0);
    }

    #[test]
    fn reversing_twice_restores_the_first_effect() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let revenue = open(&mut books, "4000", AccountType::Revenue);
        let engine = PostingEngine::default();

        let original = engine
            .post(
                &mut books,
                NewJournalEntry::new(date(), "sale")
                    .line(JournalLine::debit(cash, cents(2_500)))
                    .line(JournalLine::credit(revenue, cents(2_500))),
                Utc::now(),
            )
            .unwrap();

        let reversal = engine.reverse(&mut books, original.id, date(), Utc::now()).unwrap();
        assert_eq!(reversal.reverses, Some(original.id));
        assert_eq!(reversal.memo, format!("Reversal of {}", original.number));
        assert_eq!(balance(&mut books, cash), Money::ZERO);
        assert_eq!(balance(&mut books, revenue), Money::ZERO);

        let again = engine.reverse(&mut books, original.id, date(), Utc::now()).unwrap_err();
        assert_eq!(again, JournalError::AlreadyReversed(original.id));

        engine.reverse(&mut books, reversal.id, date(), Utc::now()).unwrap();
        assert_eq!(balance(&mut books, cash), cents(2_500));
        assert_eq!(balance(&mut books, revenue), cents(2_500));

        let stored = engine.entry(&mut books, original.id).unwrap();
        assert_eq!(stored.reversed_by, Some(reversal.id));
    }

    #[test]
    fn update_replaces_the_balance_effect() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let bank = open(&mut books, "1010", AccountType::Asset);
        let revenue = open(&mut books, "4000", AccountType::Revenue);
        let engine = PostingEngine::default();

        let entry = engine
            .post(
                &mut books,
                NewJournalEntry::new(date(), "sale")
                    .line(JournalLine::debit(cash, cents(1_000)))
                    .line(JournalLine::credit(revenue, cents(1_000))),
                Utc::now(),
            )
            .unwrap();

        let updated = engine
            .update(
                &mut books,
                entry.id,
                vec![
                    JournalLine::debit(bank, cents(1_200)),
                    JournalLine::credit(revenue, cents(1_200)),
                ],
                Some("sale (bank)".to_string()),
            )
            .unwrap();

        assert_eq!(updated.number, entry.number);
        assert_eq!(updated.memo, "sale (bank)");
        assert_eq!(balance(&mut books, cash), Money::ZERO);
        assert_eq!(balance(&mut books, bank), cents(1_200));
        assert_eq!(balance(&mut books, revenue), cents(1_200));
    }

    #[test]
    fn deleting_a_reversal_reopens_the_original() {
        let mut books = MemoryBooks::default();
        let cash = open(&mut books, "1000", AccountType::Asset);
        let revenue = open(&mut books, "4000", AccountType::Revenue);
        let engine = PostingEngine::default();

        let original = engine
            .post(
                &mut books,
                NewJournalEntry::new(date(), "sale")
                    .line(JournalLine::debit(cash, cents(700)))
                    .line(JournalLine::credit(revenue, cents(700))),
                Utc::now(),
            )
            .unwrap();
        let reversal = engine.reverse(&mut books, original.id, date(), Utc::now()).unwrap();

        assert_eq!(
            engine.delete(&mut books, original.id).unwrap_err(),
            JournalError::AlreadyReversed(original.id)
        );

        engine.delete(&mut books, reversal.id).unwrap();
        assert_eq!(balance(&mut books, cash), cents(700));
        assert!(!engine.entry(&mut books, original.id).unwrap().is_reversed());
        assert_eq!(
            engine.entry(&mut books, reversal.id).unwrap_err(),
            JournalError::EntryNotFound(reversal.id)
        );

        engine.delete(&mut books, original.id).unwrap();
        assert_eq!(balance(&mut books, cash), Money::ZERO);
        assert_eq!(balance(&mut books, revenue), Money::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Every account balance equals the signed sum of the lines posted to it.
        #[test]
        fn balances_equal_signed_line_sums(
            postings in prop::collection::vec((0usize..3, 0usize..3, 1i64..1_000_000i64), 1..20)
        ) {
            let mut books = MemoryBooks::default();
            let accounts = [
                open(&mut books, "1000", AccountType::Asset),
                open(&mut books, "2000", AccountType::Liability),
                open(&mut books, "5000", AccountType::CostOfGoodsSold),
            ];
            let engine = PostingEngine::default();
            let mut expected = [0i64; 3];

            for (debit, credit, amount) in postings {
                engine
                    .post(
                        &mut books,
                        NewJournalEntry::new(date(), "random")
                            .line(JournalLine::debit(accounts[debit], cents(amount)))
                            .line(JournalLine::credit(accounts[credit], cents(amount))),
                        Utc::now(),
                    )
                    .unwrap();
                expected[debit] += amount;
                expected[credit] -= amount;
            }

            // Liability is credit-normal: its balance is the negated debit-positive sum.
            prop_assert_eq!(balance(&mut books, accounts[0]).minor(), expected[0]);
            prop_assert_eq!(balance(&mut books, accounts[1]).minor(), -expected[1]);
            prop_assert_eq!(balance(&mut books, accounts[2]).minor(), expected[2]);
            prop_assert_eq!(expected.iter().sum::<i64>(), 0);
        }
    }
}

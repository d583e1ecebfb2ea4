use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tally_accounting::{JournalLine, NewJournalEntry};
use tally_core::{AccountId, InventoryItemId, Money, PartnerId};
use tally_documents::{DocumentKind, LineItem, NewDocument};
use tally_events::InMemoryEventBus;
use tally_infra::orchestrator::{
    CreateInventoryItem, CreateInvoiceWithStockDeduction, InitializeChart, PostJournalEntry,
    RegisterPartner,
};
use tally_infra::{InMemoryStore, Notification, Orchestrator};
use tally_inventory::{NewItem, ValuationClass};
use tally_parties::NewPartner;

type Core = Orchestrator<InMemoryStore, Arc<InMemoryEventBus<Notification>>>;

struct Fixture {
    core: Core,
    cash: AccountId,
    revenue: AccountId,
    customer: PartnerId,
    item: InventoryItemId,
}

fn setup() -> Fixture {
    let core = Orchestrator::new(InMemoryStore::new(), Arc::new(InMemoryEventBus::new()));
    let chart = core.execute(&InitializeChart::default()).unwrap();
    let code = |c: &str| chart.iter().find(|a| a.code == c).unwrap().id;

    let customer = core
        .execute(&RegisterPartner(NewPartner::customer("Bench Customer", code("1200"))))
        .unwrap()
        .id;
    let valuation = ValuationClass {
        inventory_account: code("1300"),
        cogs_account: code("5000"),
    };
    let item = core
        .execute(&CreateInventoryItem(
            NewItem::new("BENCH-1", "Bench item", Money::from_minor(400), Money::from_minor(1_000), valuation)
                .with_opening_quantity(1_000_000_000),
        ))
        .unwrap()
        .id;

    Fixture {
        cash: code("1000"),
        revenue: code("4000"),
        customer,
        item,
        core,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn cash_sale(f: &Fixture, amount: i64) -> PostJournalEntry {
    PostJournalEntry(
        NewJournalEntry::new(today(), "Cash sale")
            .line(JournalLine::debit(f.cash, Money::from_minor(amount)))
            .line(JournalLine::credit(f.revenue, Money::from_minor(amount))),
    )
}

fn bench_operation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_latency");
    group.sample_size(500);

    group.bench_function("post_journal_entry", |b| {
        let f = setup();
        b.iter(|| f.core.execute(black_box(&cash_sale(&f, 1_250))).unwrap());
    });

    group.bench_function("invoice_with_stock_deduction", |b| {
        let f = setup();
        b.iter(|| {
            let new = NewDocument::new(DocumentKind::Sale, f.customer, today())
                .line(LineItem::new(f.item, 1, Money::from_minor(1_000)));
            f.core
                .execute(black_box(&CreateInvoiceWithStockDeduction(new)))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_posting_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_throughput");

    for batch_size in [10_usize, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &size| {
            let f = setup();
            b.iter(|| {
                for i in 0..size {
                    f.core.execute(&cash_sale(&f, 100 + i as i64)).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_operation_latency, bench_posting_throughput);
criterion_main!(benches);

//! Benchmark for code scanning and dependency view throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orgaudit_core::types::DependencyEdge;
use orgaudit_core::{build_view, scanner, DependencyIndex};

const SOURCE: &str = r#"
/**
 * Handles account synchronisation.
 */
public with sharing class AccountSync implements Schedulable {
    private static final String ENDPOINT = 'https://acme.my.salesforce.com/services/apexrest/sync';
    private static final Id DEFAULT_OWNER = '005000000000001AAA';

    public void execute(SchedulableContext ctx) {
        // update stale accounts
        List<Account> accounts = [SELECT Id, Name FROM Account WHERE LastModifiedDate < LAST_N_DAYS:30];
        for (Account acc : accounts) {
            acc.OwnerId = DEFAULT_OWNER;
        }
        update accounts;
        System.assertEquals(accounts.size(), accounts.size());
    }
}
"#;

fn bench_scan_class(c: &mut Criterion) {
    c.bench_function("scan_apex_class", |b| {
        b.iter(|| black_box(scanner::scan(black_box(SOURCE))))
    });
}

fn create_edges(count: usize) -> Vec<DependencyEdge> {
    (0..count)
        .map(|i| {
            let id = format!("A{}", i % 500);
            let ref_id = format!("B{}", i % 50);
            DependencyEdge::new((&id, &id, "ApexClass"), (&ref_id, &ref_id, "CustomField"))
        })
        .collect()
}

fn bench_dependency_views(c: &mut Criterion) {
    let edges = create_edges(10_000);
    c.bench_function("build_view_scan_10k", |b| {
        b.iter(|| black_box(build_view(&edges, "B7")))
    });

    let index = DependencyIndex::from_edges(edges);
    c.bench_function("build_view_indexed_10k", |b| {
        b.iter(|| black_box(index.view("B7")))
    });
}

criterion_group!(benches, bench_scan_class, bench_dependency_views);
criterion_main!(benches);

/// Benchmarks for log segmentation, commit parsing and diff classification
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use git_churn::error::LogSource;
use git_churn::git::commit::parse_commit_buffer;
use git_churn::git::diff::{classify_diff_tokens, split_diff_output};
use git_churn::git::{DEFAULT_SENTINEL, segment_lines};

/// Synthetic `git log --numstat` output with `commits` commits of 8 files each
fn synthetic_log(commits: usize) -> String {
    let s = DEFAULT_SENTINEL;
    let mut out = String::new();
    for i in 0..commits {
        out.push_str(&format!(
            "{s}{i:07x}{s}2024-01-01T00:00:00+00:00{s}Author {i}{s}Committer{s}2024-01-02T00:00:00Z{s}Change {i}, part two{s}{:07x}\n\n",
            i + 1
        ));
        for f in 0..8 {
            if f % 4 == 0 {
                out.push_str(&format!("{}\t{}\tsrc/{{old{f} => new{f}}}/file_{i}.rs\n", f + 1, f));
            } else {
                out.push_str(&format!("{}\t{}\tsrc/module_{f}/file_{i}.rs\n", f * 3, f));
            }
        }
    }
    out
}

/// Synthetic `git diff --numstat -z` blob, every fifth entry a rename
fn synthetic_diff(entries: usize) -> String {
    let mut out = String::new();
    for i in 0..entries {
        if i % 5 == 0 {
            out.push_str(&format!("0\t0\t\0lib/old_{i}.rs\0src/new_{i}.rs\0"));
        } else {
            out.push_str(&format!("{i}\t1\tsrc/file_{i}.rs\0"));
        }
    }
    out
}

fn benchmark_log_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_parsing");

    for commits in [100, 1000, 5000].iter() {
        let log = synthetic_log(*commits);
        group.bench_with_input(BenchmarkId::from_parameter(commits), &log, |b, log| {
            b.iter(|| {
                let parsed: Vec<_> = segment_lines(log.lines().map(String::from), DEFAULT_SENTINEL)
                    .map(|buffer| parse_commit_buffer(&buffer, DEFAULT_SENTINEL, &LogSource::Stream))
                    .collect::<Result<_, _>>()
                    .unwrap();
                black_box(parsed)
            });
        });
    }

    group.finish();
}

fn benchmark_diff_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_classification");

    for entries in [100, 10_000].iter() {
        let raw = synthetic_diff(*entries);
        group.bench_with_input(BenchmarkId::from_parameter(entries), &raw, |b, raw| {
            b.iter(|| {
                let tokens = split_diff_output(raw);
                black_box(classify_diff_tokens(&tokens).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_log_parsing, benchmark_diff_classification);
criterion_main!(benches);

#[path = "common/mod.rs"]
mod common;

use common::{chrom_sizes, golden_fixture, ScriptedModel};
use varscore::scoring::{read_score_table, write_score_table_file, PeakInput, PredictionArchive, ScoreTable};
use varscore::{Metric, ScoringConfig, ShuffleSpec, Variant, VariantScorer, VariantSchema};

fn close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() <= 1e-9,
        (None, None) => true,
        _ => false,
    }
}

fn assert_tables_match(written: &ScoreTable, read: &ScoreTable) {
    assert_eq!(written.schema, read.schema);
    assert_eq!(written.groups, read.groups);
    assert_eq!(written.len(), read.len());
    for (w, r) in written.records.iter().zip(&read.records) {
        assert_eq!(w.variant, r.variant);
        assert!(close(Some(w.allele1_pred_count), Some(r.allele1_pred_count)));
        for metric in Metric::EFFECT.iter().chain(Metric::PERCENTILE) {
            assert!(
                close(w.scores.metric(*metric), r.scores.metric(*metric)),
                "{} differs for {}",
                metric.name(),
                w.variant.id
            );
            let pval = |rec: &varscore::scoring::VariantScoreRecord| {
                rec.effect_pvals
                    .as_ref()
                    .and_then(|g| g.get(*metric))
                    .or_else(|| rec.percentile_pvals.as_ref().and_then(|g| g.get(*metric)))
            };
            assert!(close(pval(w), pval(r)), "{}.pval differs", metric.name());
        }
    }
}

#[test]
fn bed_scores_survive_a_file_round_trip() {
    let mut fixture = golden_fixture();
    let sizes = chrom_sizes();
    let config = ScoringConfig::new(VariantSchema::Bed).with_shuffle(ShuffleSpec::Total(4));
    let output = VariantScorer::new(&mut fixture.model, config)
        .unwrap()
        .run(fixture.variants.clone(), &sizes, Some(PeakInput { peaks: &fixture.peaks, chrom_sizes: &sizes }))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.0.variant_scores.tsv");
    write_score_table_file(&path, &output.table).unwrap();
    assert_tables_match(&output.table, &read_score_table(&path).unwrap());
}

#[test]
fn chrombpnet_scores_with_irrational_values_round_trip() {
    let sizes = chrom_sizes();
    let mut model = ScriptedModel::new(10, 5)
        .with_variant("rs1", (3.0, vec![1.0, 2.0, 3.0, 4.0, 5.0]), (7.0, vec![5.0, 4.0, 3.0, 2.0, 1.0]))
        .with_variant("del", (11.0, vec![0.5; 5]), (2.5, vec![0.1, 0.9, 0.3, 0.3, 0.2]));
    let variants = vec![
        Variant::from_one_based("rs1", "chr1", 101, "A", "C"),
        Variant::from_one_based("del", "chr1", 201, "ACG", "A"),
    ];
    let output = VariantScorer::new(&mut model, ScoringConfig::new(VariantSchema::Chrombpnet))
        .unwrap()
        .run(variants, &sizes, None)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.tsv");
    write_score_table_file(&path, &output.table).unwrap();
    let read = read_score_table(&path).unwrap();
    assert_eq!(read.schema, VariantSchema::Chrombpnet);
    assert_tables_match(&output.table, &read);
    assert_eq!(read.records[1].variant.end, 203);
}

#[test]
fn archive_file_round_trip_without_peak_background() {
    let mut fixture = golden_fixture();
    let sizes = chrom_sizes();
    let config = ScoringConfig::new(VariantSchema::Bed).with_shuffle(ShuffleSpec::Total(4));
    let output = VariantScorer::new(&mut fixture.model, config)
        .unwrap()
        .run(fixture.variants.clone(), &sizes, None)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.0.variant_predictions.bin.gz");
    output.archive.write_file(&path).unwrap();
    let read = PredictionArchive::read_file(&path).unwrap();
    assert_eq!(read.groups.len(), 2);
    let observed = read.group("observed").unwrap();
    assert_eq!(observed.get("allele2_pred_counts").unwrap().data, vec![16.0, 6.0, 4.0]);
    assert!(read.group("shuffled").unwrap().get("shuf_max_percentile").is_none());
}

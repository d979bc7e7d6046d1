//! TSV score tables: writing, annotation and reading back.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, ensure, Result};

use crate::genomics::{TableError, Variant, VariantSchema};

use super::record::{
    ComputedGroups, EffectScores, ExtraColumns, Metric, PercentileScores, PvalueGroup, RowScores, ScoreTable,
    VariantScoreRecord,
};

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn input_cells(schema: VariantSchema, variant: &Variant) -> Vec<String> {
    match schema {
        VariantSchema::Bed => vec![
            variant.chrom.to_string(),
            variant.start.to_string(),
            variant.end.to_string(),
            variant.allele1.clone(),
            variant.allele2.clone(),
            variant.id.to_string(),
        ],
        VariantSchema::Chrombpnet => vec![
            variant.chrom.to_string(),
            (variant.start + 1).to_string(),
            variant.allele1.clone(),
            variant.allele2.clone(),
            variant.id.to_string(),
        ],
    }
}

fn row_cells(table: &ScoreTable, record: &VariantScoreRecord) -> Vec<String> {
    let mut cells = input_cells(table.schema, &record.variant);
    let effect = &record.scores.effect;
    cells.push(record.allele1_pred_count.to_string());
    cells.push(record.allele2_pred_count.to_string());
    cells.extend(
        [
            effect.logfc,
            effect.abs_logfc,
            effect.jsd,
            effect.original_jsd,
            effect.logfc_x_jsd,
            effect.abs_logfc_x_jsd,
        ]
        .map(cell),
    );

    if table.groups.effect_pvals {
        cells.extend(Metric::EFFECT.iter().map(|&m| {
            cell(record.effect_pvals.as_ref().and_then(|group| group.get(m)))
        }));
    }
    if table.groups.percentiles {
        let pct = record.scores.percentile.unwrap_or_default();
        cells.push(cell(pct.allele1_percentile));
        cells.push(cell(pct.allele2_percentile));
        cells.extend(Metric::PERCENTILE.iter().map(|&m| cell(record.scores.metric(m))));
    }
    if table.groups.percentile_pvals {
        cells.extend(Metric::PERCENTILE.iter().map(|&m| {
            cell(record.percentile_pvals.as_ref().and_then(|group| group.get(m)))
        }));
    }
    cells
}

fn write_rows<W: Write>(writer: &mut W, table: &ScoreTable) -> Result<()> {
    let extra = &table.extra;
    if !extra.is_empty() {
        ensure!(
            extra.rows.len() == table.len(),
            "extra columns have {} rows for {} records",
            extra.rows.len(),
            table.len()
        );
    }
    writeln!(writer, "{}", table.columns().join("\t"))?;
    for (idx, record) in table.records.iter().enumerate() {
        let mut cells = row_cells(table, record);
        if let Some(row) = extra.rows.get(idx) {
            ensure!(
                row.len() == extra.names.len(),
                "row {} has {} extra cells for {} extra columns",
                idx + 1,
                row.len(),
                extra.names.len()
            );
            cells.extend(row.iter().cloned());
        }
        writeln!(writer, "{}", cells.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a score table as TSV with a header row. Undefined values are empty
/// cells; pass-through columns follow the computed ones.
pub fn write_score_table<W: Write>(writer: &mut W, table: &ScoreTable) -> Result<()> {
    write_rows(writer, table)
}

/// Write a score table with `column` set to one value per row. Columns the
/// table already carries are kept; a column of the same name is overwritten.
pub fn write_annotated_score_table<W: Write>(
    writer: &mut W,
    mut table: ScoreTable,
    column: &str,
    values: Vec<String>,
) -> Result<()> {
    ensure!(
        values.len() == table.len(),
        "column '{column}' has {} values for {} rows",
        values.len(),
        table.len()
    );
    table.extra.set(column, values);
    write_rows(writer, &table)
}

/// Write a score table to a file.
pub fn write_score_table_file(path: &Path, table: &ScoreTable) -> Result<()> {
    let file = File::create(path).map_err(|e| TableError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_score_table(&mut writer, table)
}

/// Render a score table into a string (useful for tests and snapshots).
pub fn render_score_table(table: &ScoreTable) -> Result<String> {
    let mut buffer = Vec::new();
    write_score_table(&mut buffer, table)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered score table is not valid UTF-8"))
}

struct RowReader<'a> {
    path: &'a Path,
    line: usize,
    index: &'a HashMap<String, usize>,
    fields: Vec<&'a str>,
}

impl<'a> RowReader<'a> {
    fn text(&self, column: &str) -> Result<&'a str, TableError> {
        let idx = self
            .index
            .get(column)
            .ok_or_else(|| TableError::malformed(self.path, 1, format!("missing column '{column}'")))?;
        self.fields
            .get(*idx)
            .copied()
            .ok_or_else(|| TableError::malformed(self.path, self.line, format!("row is missing '{column}'")))
    }

    fn optional(&self, column: &str) -> Result<Option<f64>, TableError> {
        let value = self.text(column)?;
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|_| TableError::malformed(self.path, self.line, format!("invalid {column} '{value}'")))
    }

    fn required<T: std::str::FromStr>(&self, column: &str) -> Result<T, TableError> {
        let value = self.text(column)?;
        value
            .parse()
            .map_err(|_| TableError::malformed(self.path, self.line, format!("invalid {column} '{value}'")))
    }
}

/// Read a score table written by [`write_score_table`].
///
/// The schema is inferred from the presence of an `end` column and the
/// optional groups from the presence of their first column.
pub fn read_score_table(path: &Path) -> Result<ScoreTable, TableError> {
    let file = File::open(path).map_err(|e| TableError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|e| TableError::io(path, e))?,
        None => return Err(TableError::malformed(path, 1, "empty score table")),
    };
    let index: HashMap<String, usize> = header
        .split('\t')
        .enumerate()
        .map(|(idx, name)| (name.to_string(), idx))
        .collect();

    let schema = if index.contains_key("end") {
        VariantSchema::Bed
    } else {
        VariantSchema::Chrombpnet
    };
    let groups = ComputedGroups {
        effect_pvals: index.contains_key(&Metric::LogFc.pval_column()),
        percentiles: index.contains_key("allele1_percentile"),
        percentile_pvals: index.contains_key(&Metric::MaxPercentile.pval_column()),
    };
    let computed: HashSet<String> = ScoreTable::computed_columns(schema, groups).into_iter().collect();
    let passthrough: Vec<(usize, String)> = header
        .split('\t')
        .enumerate()
        .filter(|(_, name)| !computed.contains(*name))
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut records = Vec::new();
    let mut extra = ExtraColumns {
        names: passthrough.iter().map(|(_, name)| name.clone()).collect(),
        rows: Vec::new(),
    };
    for (idx, line) in lines.enumerate() {
        let line = line.map_err(|e| TableError::io(path, e))?;
        if line.is_empty() {
            continue;
        }
        let row = RowReader {
            path,
            line: idx + 2,
            index: &index,
            fields: line.split('\t').collect(),
        };
        records.push(read_record(&row, schema, groups)?);
        if !extra.is_empty() {
            extra.rows.push(
                passthrough
                    .iter()
                    .map(|(col, _)| row.fields.get(*col).copied().unwrap_or_default().to_string())
                    .collect(),
            );
        }
    }

    Ok(ScoreTable {
        schema,
        groups,
        records,
        extra,
    })
}

fn read_record(
    row: &RowReader<'_>,
    schema: VariantSchema,
    groups: ComputedGroups,
) -> Result<VariantScoreRecord, TableError> {
    let id = row.text("variant_id")?;
    let chrom = row.text("chr")?;
    let allele1 = row.text("allele1")?;
    let allele2 = row.text("allele2")?;
    let variant = match schema {
        VariantSchema::Bed => Variant::new(id, chrom, row.required("pos")?, row.required("end")?, allele1, allele2),
        VariantSchema::Chrombpnet => Variant::from_one_based(id, chrom, row.required("pos")?, allele1, allele2),
    };

    let effect = EffectScores {
        logfc: row.optional("logfc")?,
        abs_logfc: row.optional("abs_logfc")?,
        jsd: row.optional("jsd")?,
        original_jsd: row.optional("original_jsd")?,
        logfc_x_jsd: row.optional("logfc_x_jsd")?,
        abs_logfc_x_jsd: row.optional("abs_logfc_x_jsd")?,
    };
    let percentile = if groups.percentiles {
        Some(PercentileScores {
            allele1_percentile: row.optional("allele1_percentile")?,
            allele2_percentile: row.optional("allele2_percentile")?,
            max_percentile: row.optional("max_percentile")?,
            percentile_change: row.optional("percentile_change")?,
            abs_percentile_change: row.optional("abs_percentile_change")?,
            logfc_x_max_percentile: row.optional("logfc_x_max_percentile")?,
            abs_logfc_x_max_percentile: row.optional("abs_logfc_x_max_percentile")?,
            jsd_x_max_percentile: row.optional("jsd_x_max_percentile")?,
            logfc_x_jsd_x_max_percentile: row.optional("logfc_x_jsd_x_max_percentile")?,
            abs_logfc_x_jsd_x_max_percentile: row.optional("abs_logfc_x_jsd_x_max_percentile")?,
        })
    } else {
        None
    };

    let read_group = |metrics: &'static [Metric]| -> Result<PvalueGroup, TableError> {
        let values = metrics
            .iter()
            .map(|m| row.optional(&m.pval_column()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PvalueGroup::new(metrics, values))
    };

    Ok(VariantScoreRecord {
        variant,
        allele1_pred_count: row.required("allele1_pred_counts")?,
        allele2_pred_count: row.required("allele2_pred_counts")?,
        scores: RowScores { effect, percentile },
        effect_pvals: if groups.effect_pvals { Some(read_group(Metric::EFFECT)?) } else { None },
        percentile_pvals: if groups.percentile_pvals {
            Some(read_group(Metric::PERCENTILE)?)
        } else {
            None
        },
    })
}

//! Materializing one area into records.
//!
//! `data_cells` enumerates lanes, one per cell; each lane continues along
//! `data_direction` to the grid boundary, one observation per step. Every
//! extractor is resolved and extracted once, in document order, then read
//! per (observation, lane) according to its axis.

use std::collections::BTreeMap;

use super::dates;
use super::extract::{Conversion, Extractor, Outcome};
use super::resolve::{self, Axis};
use super::Record;
use crate::error::{ExtractionError, ExtractionResult};
use crate::grid::{Cell, Grid};
use crate::rules::{
    Area, Coord, DateOrigin, DatePart, DateSource, Direction, ExtractParams, HeaderRole, Source,
    TitleIdKind,
};

/// Extracted values of one source. `None` marks a skipped value.
#[derive(Debug)]
struct Series {
    axis: Axis,
    values: Vec<Option<String>>,
}

impl Series {
    fn at(&self, observation: usize, lane: usize) -> Option<&str> {
        let index = match self.axis {
            Axis::Broadcast => 0,
            Axis::Lane => lane,
            Axis::Observation => observation,
        };
        self.values.get(index).and_then(|v| v.as_deref())
    }
}

#[derive(Debug)]
enum Field {
    Plain(Series),
    Composed { year: Series, month: Series },
}

impl Field {
    fn at(&self, observation: usize, lane: usize) -> Option<String> {
        match self {
            Field::Plain(series) => series.at(observation, lane).map(str::to_string),
            Field::Composed { year, month } => Some(dates::combine(
                year.at(observation, lane)?,
                month.at(observation, lane)?,
            )),
        }
    }
}

struct Shape {
    data_direction: Direction,
    lanes: usize,
    observations: usize,
}

struct AreaEvaluator<'a> {
    index: usize,
    grid: &'a Grid,
    shape: Shape,
}

impl<'a> AreaEvaluator<'a> {
    fn series(
        &self,
        role: String,
        source: &Source,
        params: &ExtractParams,
        conversion: Conversion,
    ) -> ExtractionResult<Series> {
        let axis = resolve::axis_of(source, self.shape.data_direction);
        let mut raws = resolve::resolve(source, self.grid);
        raws.truncate(match axis {
            Axis::Broadcast => 1,
            Axis::Lane => self.shape.lanes,
            Axis::Observation => self.shape.observations,
        });
        let values = Extractor::new(self.index, role, params, conversion)
            .extract_all(&raws)?
            .into_iter()
            .map(|outcome| match outcome {
                Outcome::Value(value) => Some(value),
                Outcome::Skip => None,
            })
            .collect();
        Ok(Series { axis, values })
    }

    fn text(&self, role: String, source: &Source, params: &ExtractParams) -> ExtractionResult<Field> {
        self.series(role, source, params, Conversion::Text).map(Field::Plain)
    }

    fn part(&self, role: &str, part: &DatePart, outer: Option<&String>, year: bool) -> ExtractionResult<Series> {
        let pattern = part.date_pattern.as_ref().or(outer).cloned();
        let conversion = if year {
            Conversion::Year { pattern }
        } else {
            Conversion::Month { pattern }
        };
        self.series(role.to_string(), &part.source, &part.extract_params, conversion)
    }

    fn date(&self, date: &DateSource) -> ExtractionResult<Field> {
        match &date.origin {
            DateOrigin::Direct(source) => self
                .series(
                    "date".to_string(),
                    source,
                    &date.extract_params,
                    Conversion::Date {
                        pattern: date.date_pattern.clone(),
                    },
                )
                .map(Field::Plain),
            DateOrigin::Composed(parts) => Ok(Field::Composed {
                year: self.part("date.year", &parts.year, date.date_pattern.as_ref(), true)?,
                month: self.part("date.month", &parts.month, date.date_pattern.as_ref(), false)?,
            }),
        }
    }

    fn value_at(&self, start: Coord, observation: usize) -> Option<Coord> {
        (0..observation).try_fold(start, |coord, _| coord.step(self.shape.data_direction))
    }
}

/// Every source an area reads, header roles first.
fn area_sources(area: &Area) -> Vec<&Source> {
    let mut sources: Vec<&Source> = area
        .data_headers
        .roles
        .iter()
        .flat_map(HeaderRole::sources)
        .collect();
    sources.extend(area.metrics.iter().map(|m| &m.source));
    sources.extend(area.dates.iter().flat_map(DateSource::sources));
    sources.extend(area.titles.iter().map(|t| &t.source));
    sources.extend(area.title_ids.iter().map(|t| &t.source));
    sources.extend(area.dimensions.iter().map(|d| &d.source));
    sources.extend(area.organizations.iter().map(|o| &o.source));
    sources
}

/// Parse a value cell. Whitespace and `1,234` grouping are tolerated.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let cleaned: String = if is_grouped(trimmed) {
        trimmed.chars().filter(|&c| c != ',').collect()
    } else {
        trimmed.chars().filter(|c| !c.is_whitespace()).collect()
    };
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_grouped(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let integer = unsigned.split('.').next().unwrap_or(unsigned);
    let mut groups = integer.split(',');
    let head_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()));
    integer.contains(',')
        && head_ok
        && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Evaluate one area into raw records, before post-processing.
pub fn evaluate_area(index: usize, area: &Area, grid: &Grid) -> ExtractionResult<Vec<Record>> {
    let headers = &area.data_headers;
    let data_direction = headers.data_direction;
    let lane_starts = resolve::walk(&headers.data_cells, grid);

    let mut lanes = lane_starts.len();
    let mut observations = lane_starts
        .first()
        .map(|start| resolve::walk_from(*start, data_direction, None, grid).len())
        .unwrap_or(0);
    for source in area_sources(area) {
        match resolve::ranged_len(source, grid, data_direction) {
            Some((Axis::Lane, len)) => lanes = lanes.min(len),
            Some((Axis::Observation, len)) => observations = observations.min(len),
            _ => {}
        }
    }
    if lanes == 0 || observations == 0 {
        return Ok(Vec::new());
    }

    let evaluator = AreaEvaluator {
        index,
        grid,
        shape: Shape {
            data_direction,
            lanes,
            observations,
        },
    };

    let metric = match (area.header_metric(), &area.metrics) {
        (Some(metric), _) | (None, Some(metric)) => {
            evaluator.text("metric".to_string(), &metric.source, &metric.extract_params)?
        }
        (None, None) => return Ok(Vec::new()),
    };
    let date = match area.header_date().or(area.dates.as_ref()) {
        Some(date) => evaluator.date(date)?,
        None => return Ok(Vec::new()),
    };
    let title = area
        .titles
        .as_ref()
        .map(|t| evaluator.text("title".to_string(), &t.source, &t.extract_params))
        .transpose()?;
    let title_ids: Vec<(TitleIdKind, Field)> = area
        .title_ids
        .iter()
        .map(|t| {
            evaluator
                .text(format!("title_id {}", t.name), &t.source, &t.extract_params)
                .map(|field| (t.name, field))
        })
        .collect::<ExtractionResult<_>>()?;
    let dimensions: Vec<(&str, Field)> = area
        .dimensions
        .iter()
        .map(|d| {
            evaluator
                .text(format!("dimension '{}'", d.name), &d.source, &d.extract_params)
                .map(|field| (d.name.as_str(), field))
        })
        .collect::<ExtractionResult<_>>()?;
    let organization = area
        .organizations
        .as_ref()
        .map(|o| evaluator.text("organization".to_string(), &o.source, &o.extract_params))
        .transpose()?;

    let mut records = Vec::new();
    for observation in 0..observations {
        'lanes: for (lane, start) in lane_starts.iter().take(lanes).enumerate() {
            let Some(metric) = metric.at(observation, lane) else {
                continue;
            };
            let Some(date) = date.at(observation, lane) else {
                continue;
            };
            let title = match &title {
                Some(field) => match field.at(observation, lane) {
                    Some(title) => Some(title),
                    None => continue,
                },
                None => None,
            };
            let organization = match &organization {
                Some(field) => match field.at(observation, lane) {
                    Some(organization) => Some(organization),
                    None => continue,
                },
                None => None,
            };
            let mut ids = BTreeMap::new();
            for (kind, field) in &title_ids {
                match field.at(observation, lane) {
                    Some(id) => ids.insert(*kind, id),
                    None => continue 'lanes,
                };
            }
            let mut dims = Vec::with_capacity(dimensions.len());
            for (name, field) in &dimensions {
                match field.at(observation, lane) {
                    Some(value) => dims.push((name.to_string(), value)),
                    None => continue 'lanes,
                }
            }

            let Some(coord) = evaluator.value_at(*start, observation) else {
                continue;
            };
            let value = match grid.get(coord) {
                None | Some(Cell::Blank) => continue,
                Some(Cell::Number(n)) => *n,
                Some(Cell::Text(text)) => {
                    parse_number(text).ok_or_else(|| ExtractionError::NotANumber {
                        area: index,
                        row: coord.row,
                        col: coord.col,
                        content: text.clone(),
                    })?
                }
            };

            records.push(Record {
                metric,
                date,
                title,
                title_ids: ids,
                dimensions: dims,
                organization,
                value,
            });
        }
    }
    Ok(records)
}

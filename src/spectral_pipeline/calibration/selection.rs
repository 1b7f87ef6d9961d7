//! Rectangle selection on the scaled calibration preview.
//!
//! A [`SelectionSession`] owns the selection state. Hosts feed it
//! [`SelectionEvent`]s, either scripted or parsed from a line-oriented input,
//! and [`run_selection`] polls them until the user proceeds or quits.

use std::io::BufRead;
use std::str::FromStr;

use tracing::{info, warn};

use crate::spectral_pipeline::common::config::Viewport;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::Region;

/// A pixel position in display (preview) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Button pressed: starts a new rectangle
    Press(Point),
    /// Button released: closes the rectangle
    Release(Point),
    /// Discard the current rectangle
    Reset,
    /// Commit the current rectangle
    Proceed,
    /// Abort the whole batch
    Quit,
}

impl SelectionEvent {
    /// Events that select the rectangle spanned by two corners and commit it.
    pub fn scripted(first: Point, second: Point) -> Vec<SelectionEvent> {
        vec![Self::Press(first), Self::Release(second), Self::Proceed]
    }
}

impl FromStr for SelectionEvent {
    type Err = PipelineError;

    /// Parses `press X Y`, `release X Y`, `r`, `p` or `q` (long forms accepted).
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();

        let mut point = || -> Result<Point> {
            let mut coord = || {
                parts
                    .next()
                    .and_then(|v| v.parse::<u32>().ok())
                    .ok_or_else(|| PipelineError::InvalidRegion(format!("bad point in '{line}'")))
            };
            let x = coord()?;
            let y = coord()?;
            Ok(Point::new(x, y))
        };

        match command.as_str() {
            "press" | "down" => Ok(Self::Press(point()?)),
            "release" | "up" => Ok(Self::Release(point()?)),
            "r" | "reset" => Ok(Self::Reset),
            "p" | "proceed" => Ok(Self::Proceed),
            "q" | "quit" => Ok(Self::Quit),
            _ => Err(PipelineError::InvalidRegion(format!(
                "unknown selection command '{line}'"
            ))),
        }
    }
}

/// Reads selection events line by line; unparsable lines are logged and skipped.
pub fn events_from_reader<B: BufRead>(reader: B) -> impl Iterator<Item = SelectionEvent> {
    reader
        .lines()
        .map_while(std::result::Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.parse::<SelectionEvent>() {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
}

#[derive(Debug, Clone)]
pub struct SelectionSession {
    scale: f64,
    anchor: Option<Point>,
    selection: Option<Region>,
}

impl SelectionSession {
    /// `scale` is the factor applied to the full-resolution image for display.
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            anchor: None,
            selection: None,
        }
    }

    pub fn for_image(width: usize, height: usize, viewport: &Viewport) -> Self {
        Self::new(viewport.scale_for(width, height))
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_selecting(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn begin_selection(&mut self, point: Point) {
        self.anchor = Some(point);
    }

    /// Closes the rectangle started by `begin_selection`.
    ///
    /// Corners are normalized so the result is independent of drag direction.
    /// Returns `None` when no selection was in progress.
    pub fn end_selection(&mut self, point: Point) -> Option<Region> {
        let anchor = self.anchor.take()?;
        let region = Region::new(
            anchor.x.min(point.x) as usize,
            anchor.y.min(point.y) as usize,
            anchor.x.max(point.x) as usize,
            anchor.y.max(point.y) as usize,
        );
        self.selection = Some(region);
        Some(region)
    }

    /// Current rectangle in display coordinates.
    pub fn selection(&self) -> Option<Region> {
        self.selection
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.selection = None;
    }

    /// The committed rectangle mapped back to full resolution.
    pub fn commit(&self) -> Result<Region> {
        let display = self
            .selection
            .ok_or_else(|| PipelineError::InvalidRegion("no rectangle selected".into()))?;

        let to_full = |v: usize| (v as f64 / self.scale) as usize;
        let region = Region::new(
            to_full(display.x0),
            to_full(display.y0),
            to_full(display.x1),
            to_full(display.y1),
        );
        if region.is_empty() {
            return Err(PipelineError::InvalidRegion(format!(
                "selected rectangle {region:?} has no area"
            )));
        }
        Ok(region)
    }
}

/// Feeds `events` into `session` until a rectangle is committed.
///
/// `Quit`, or running out of events, cancels the selection.
pub fn run_selection<I>(session: &mut SelectionSession, events: I) -> Result<Region>
where
    I: IntoIterator<Item = SelectionEvent>,
{
    for event in events {
        match event {
            SelectionEvent::Press(point) => session.begin_selection(point),
            SelectionEvent::Release(point) => {
                if let Some(region) = session.end_selection(point) {
                    info!(
                        top_left = ?(region.x0, region.y0),
                        bottom_right = ?(region.x1, region.y1),
                        "Rectangle selected"
                    );
                }
            }
            SelectionEvent::Reset => {
                session.reset();
                info!("Selection reset");
            }
            SelectionEvent::Proceed => match session.commit() {
                Ok(region) => return Ok(region),
                Err(e) => warn!("Cannot proceed: {}", e),
            },
            SelectionEvent::Quit => return Err(PipelineError::SelectionCancelled),
        }
    }

    warn!("Selection input ended before a rectangle was committed");
    Err(PipelineError::SelectionCancelled)
}

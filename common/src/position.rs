//! Parsing of cone-search position strings: `<position>[:<radius>]`
//!
//! Positions are ICRS right ascension and declination, either as two decimal
//! degree values (`80.894 -69.756`), as `12h34m56.7s -45d30m15s`, or as six
//! sexagesimal tokens (`05 23 34.6 -69 45 22`). The declination always
//! carries an explicit sign.
//!
//! The radius is decimal degrees, or arcminutes/arcseconds with a trailing
//! `'` or `"`, or one to three integers read as (degrees) minutes seconds.
//! A missing or unreadable radius falls back to the configured default.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

#[allow(unused_imports)]
use crate::logging::{debug, error, info, warn};

lazy_static! {
    static ref HMS: Regex = Regex::new(r"(?i)^(\d{1,2})h(\d{1,2})m(\d{1,2}(?:\.\d+)?)s?$").unwrap();
    static ref DMS: Regex = Regex::new(r"(?i)^([+-])(\d{1,2})d(\d{1,2})m(\d{1,2}(?:\.\d+)?)s?$").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid position string: {input} ({reason})")]
pub struct IncorrectPositionFormat {
    pub input: String,
    pub reason: String,
}

/// ICRS coordinate, both in decimal degrees
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub ra: f64,
    pub dec: f64,
}

impl Coordinate {
    /// Right ascension and declination as `05h23m34.6000s` and `-69d45m22.0000s`
    pub fn to_hmsdms(&self) -> (String, String) {
        let (h, m, s) = split_sexagesimal(self.ra.rem_euclid(360.0) / 15.0);
        let (d, am, as_) = split_sexagesimal(self.dec.abs());
        let sign = if self.dec < 0.0 { '-' } else { '+' };

        (
            format!("{:02}h{:02}m{:07.4}s", h, m, s),
            format!("{}{:02}d{:02}m{:07.4}s", sign, d, am, as_),
        )
    }
}

/// Splits a non-negative value into whole units, minutes and seconds rounded to 4 places
fn split_sexagesimal(value: f64) -> (u64, u64, f64) {
    let total = (value * 3600.0 * 10_000.0).round() / 10_000.0;
    let units = (total / 3600.0).floor();
    let minutes = ((total - units * 3600.0) / 60.0).floor();
    let seconds = total - units * 3600.0 - minutes * 60.0;

    (units as u64, minutes as u64, seconds.max(0.0))
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coordinate: Coordinate,
    /// Search radius in degrees
    pub radius: f64,
}

impl Position {
    /// The same position with the radius capped at `max_radius`
    pub fn clamped(&self, max_radius: f64) -> Position {
        Position { coordinate: self.coordinate, radius: self.radius.min(max_radius) }
    }
}

#[derive(Debug, Clone)]
pub struct PositionParser {
    default_radius: f64,
}

impl PositionParser {
    pub fn new(default_radius: f64) -> Self {
        PositionParser { default_radius }
    }

    pub fn parse(&self, position_str: &str) -> Result<Position, IncorrectPositionFormat> {
        let (position, radius) = match position_str.split_once(':') {
            Some((position, radius)) => (position, Some(radius)),
            None => (position_str, None),
        };

        let coordinate = parse_coordinate(position.trim())
            .map_err(|reason| IncorrectPositionFormat { input: position_str.to_string(), reason })?;

        let radius = match radius.map(|r| (r, parse_radius(r))) {
            Some((_, Some(radius))) => radius,
            Some((text, None)) => {
                warn!("Unable to interpret radius '{}' in '{}'; using the default of {} degrees", text, position_str, self.default_radius);
                self.default_radius
            }
            None => self.default_radius,
        };

        debug!("Parsed position '{}' as {:?} with radius {}", position_str, coordinate, radius);

        Ok(Position { coordinate, radius })
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Radius in degrees; None when the text is not one of the recognised forms
fn parse_radius(radius: &str) -> Option<f64> {
    let radius = radius.trim().replace("''", "\"");

    let degrees = if let Some(value) = parse_number(&radius) {
        value
    } else if let Some(arcmin) = radius.strip_suffix('\'') {
        parse_number(arcmin.trim())? / 60.0
    } else if let Some(arcsec) = radius.strip_suffix('"') {
        parse_number(arcsec.trim())? / 3600.0
    } else {
        let parts = radius.split_whitespace()
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        // left-pad to (degrees, minutes, seconds)
        let (d, m, s) = match parts.as_slice() {
            [s] => (0, 0, *s),
            [m, s] => (0, *m, *s),
            [d, m, s] => (*d, *m, *s),
            _ => return None,
        };

        d as f64 + m as f64 / 60.0 + s as f64 / 3600.0
    };

    Some(degrees).filter(|d| *d > 0.0)
}

fn parse_coordinate(position: &str) -> Result<Coordinate, String> {
    let tokens = position.split_whitespace().collect::<Vec<_>>();

    let coordinate = match tokens.as_slice() {
        [ra, dec] => match (parse_number(ra), parse_number(dec)) {
            (Some(ra), Some(dec_value)) => {
                require_sign(dec)?;
                Coordinate { ra, dec: dec_value }
            }
            _ => parse_letter_markers(ra, dec)?,
        },
        [h, m, s, d, am, as_] => {
            require_sign(d)?;

            let (h, m, s) = (number(h)?, number(m)?, number(s)?);
            let (d, am, as_) = (number(d)?, number(am)?, number(as_)?);

            check_sexagesimal(h, m, s, 24.0)?;
            check_sexagesimal(d.abs(), am, as_, 90.0 + f64::EPSILON)?;

            let dec = d.abs() + am / 60.0 + as_ / 3600.0;

            Coordinate {
                ra: (h + m / 60.0 + s / 3600.0) * 15.0,
                dec: if d.is_sign_negative() { -dec } else { dec },
            }
        }
        _ => return Err(format!("expected 2 or 6 space separated values, found {}", tokens.len())),
    };

    if !(0.0..360.0).contains(&coordinate.ra) {
        return Err(format!("right ascension {} is outside [0, 360)", coordinate.ra));
    }

    if !(-90.0..=90.0).contains(&coordinate.dec) {
        return Err(format!("declination {} is outside [-90, 90]", coordinate.dec));
    }

    Ok(coordinate)
}

fn number(s: &str) -> Result<f64, String> {
    parse_number(s).ok_or_else(|| format!("'{}' is not a number", s))
}

fn require_sign(dec: &str) -> Result<(), String> {
    if dec.starts_with('+') || dec.starts_with('-') {
        Ok(())
    } else {
        Err(format!("declination '{}' must start with + or -", dec))
    }
}

fn check_sexagesimal(units: f64, minutes: f64, seconds: f64, limit: f64) -> Result<(), String> {
    if units < 0.0 || units >= limit {
        return Err(format!("{} is out of range", units));
    }

    if !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return Err(format!("minutes {} or seconds {} out of range", minutes, seconds));
    }

    Ok(())
}

fn parse_letter_markers(ra: &str, dec: &str) -> Result<Coordinate, String> {
    require_sign(dec)?;

    let ra_caps = HMS.captures(ra).ok_or_else(|| format!("cannot read right ascension '{}'", ra))?;
    let dec_caps = DMS.captures(dec).ok_or_else(|| format!("cannot read declination '{}'", dec))?;

    let (h, m, s) = (number(&ra_caps[1])?, number(&ra_caps[2])?, number(&ra_caps[3])?);
    let (d, am, as_) = (number(&dec_caps[2])?, number(&dec_caps[3])?, number(&dec_caps[4])?);

    check_sexagesimal(h, m, s, 24.0)?;
    check_sexagesimal(d, am, as_, 90.0 + f64::EPSILON)?;

    let dec = d + am / 60.0 + as_ / 3600.0;

    Ok(Coordinate {
        ra: (h + m / 60.0 + s / 3600.0) * 15.0,
        dec: if &dec_caps[1] == "-" { -dec } else { dec },
    })
}

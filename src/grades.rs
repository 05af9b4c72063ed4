use serde::{Deserialize, Serialize, Serializer};

use crate::error::{EngineError, EngineResult};

pub const UNKNOWN_SUBJECT_NAME: &str = "Unknown Subject";

pub const MIN_NUMERIC_GRADE: f64 = 1.0;
pub const MAX_NUMERIC_GRADE: f64 = 5.0;

/// Largest unit load a single subject or schedule entry may carry.
pub const MAX_UNITS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LetterGrade {
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
    /// Incomplete.
    Inc,
    /// Officially dropped.
    Od,
    /// Unofficially dropped.
    Ud,
    /// No grade yet.
    Ngy,
}

/// Lower bound of each half-open numeric bucket, best grade first.
/// The last bucket (F) is unbounded above.
const BUCKETS: [(f64, LetterGrade); 12] = [
    (1.00, LetterGrade::A),
    (1.25, LetterGrade::AMinus),
    (1.50, LetterGrade::BPlus),
    (1.75, LetterGrade::B),
    (2.00, LetterGrade::BMinus),
    (2.25, LetterGrade::CPlus),
    (2.50, LetterGrade::C),
    (2.75, LetterGrade::CMinus),
    (3.00, LetterGrade::DPlus),
    (3.25, LetterGrade::D),
    (3.50, LetterGrade::DMinus),
    (5.00, LetterGrade::F),
];

impl LetterGrade {
    pub const ALL: [LetterGrade; 16] = [
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::DMinus,
        LetterGrade::F,
        LetterGrade::Inc,
        LetterGrade::Od,
        LetterGrade::Ud,
        LetterGrade::Ngy,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
            LetterGrade::Inc => "INC",
            LetterGrade::Od => "OD",
            LetterGrade::Ud => "UD",
            LetterGrade::Ngy => "NGY",
        }
    }

    /// Case-insensitive lookup of a letter code.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.code().eq_ignore_ascii_case(t))
    }

    /// Grade-scale value, or `None` for the non-gradable codes.
    pub fn numeric(self) -> Option<f64> {
        match self {
            LetterGrade::A => Some(1.00),
            LetterGrade::AMinus => Some(1.25),
            LetterGrade::BPlus => Some(1.50),
            LetterGrade::B => Some(1.75),
            LetterGrade::BMinus => Some(2.00),
            LetterGrade::CPlus => Some(2.25),
            LetterGrade::C => Some(2.50),
            LetterGrade::CMinus => Some(2.75),
            LetterGrade::DPlus => Some(3.00),
            LetterGrade::D => Some(3.25),
            LetterGrade::DMinus => Some(3.50),
            LetterGrade::F => Some(5.00),
            LetterGrade::Inc | LetterGrade::Od | LetterGrade::Ud | LetterGrade::Ngy => None,
        }
    }

    /// Half-open bucketing: `[1.00,1.25) -> A`, ..., `[3.50,5.00) -> D-`, `[5.00,inf) -> F`.
    pub fn from_numeric(n: f64) -> Option<Self> {
        if !n.is_finite() || n < MIN_NUMERIC_GRADE {
            return None;
        }
        BUCKETS
            .iter()
            .rev()
            .find(|(lower, _)| n >= *lower)
            .map(|(_, g)| *g)
    }
}

impl Serialize for LetterGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

pub fn compute_gpa(units: Option<i64>, numeric_grade: Option<f64>) -> Option<f64> {
    match (units, numeric_grade) {
        (Some(u), Some(n)) => Some(u as f64 * n),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GradeKey {
    pub student_id: String,
    pub subject_code: String,
    pub academic_year: String,
    pub semester: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: String,
    pub student_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub units: Option<i64>,
    pub letter_grade: Option<LetterGrade>,
    pub numeric_grade: Option<f64>,
    pub gpa: Option<f64>,
    pub academic_year: String,
    pub semester: String,
    pub is_released: bool,
    pub remarks: Option<String>,
    pub updated_at: Option<String>,
}

impl GradeRecord {
    /// Apply a numeric grade as the source of truth and re-derive the rest.
    pub fn set_numeric(&mut self, numeric_grade: f64) {
        self.numeric_grade = Some(numeric_grade);
        self.letter_grade = LetterGrade::from_numeric(numeric_grade);
        self.refresh_gpa();
    }

    pub fn refresh_gpa(&mut self) {
        self.gpa = compute_gpa(self.units, self.numeric_grade);
    }

    pub fn is_encoded(&self) -> bool {
        self.numeric_grade.is_some() || self.letter_grade.is_some()
    }
}

/// Partially filled record as supplied by a caller of `grades.save`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeDraft {
    pub student_id: String,
    pub subject_code: String,
    pub academic_year: String,
    pub semester: String,
    pub subject_name: Option<String>,
    pub units: Option<i64>,
    pub letter_grade: Option<String>,
    pub numeric_grade: Option<f64>,
    pub is_released: Option<bool>,
    pub remarks: Option<String>,
}

impl GradeDraft {
    pub fn key(&self) -> EngineResult<GradeKey> {
        Ok(GradeKey {
            student_id: require_field("studentId", &self.student_id)?,
            subject_code: require_field("subjectCode", &self.subject_code)?,
            academic_year: require_field("academicYear", &self.academic_year)?,
            semester: require_field("semester", &self.semester)?,
        })
    }
}

pub fn require_field(name: &str, value: &str) -> EngineResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(EngineError::validation(format!("missing {}", name)));
    }
    Ok(t.to_string())
}

/// Resolve the letter/numeric pair for a save. When both are supplied the
/// numeric grade wins and the letter is re-derived from it.
pub fn resolve_grade_pair(
    letter: Option<&str>,
    numeric: Option<f64>,
) -> EngineResult<(Option<LetterGrade>, Option<f64>)> {
    if let Some(n) = numeric {
        check_numeric_grade(n)?;
        return Ok((LetterGrade::from_numeric(n), Some(n)));
    }
    match letter.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let Some(g) = LetterGrade::parse(raw) else {
                return Err(EngineError::validation_with(
                    "unknown letter grade",
                    serde_json::json!({ "letterGrade": raw }),
                ));
            };
            Ok((Some(g), g.numeric()))
        }
        None => Ok((None, None)),
    }
}

pub fn check_units(units: i64) -> EngineResult<()> {
    if !(1..=MAX_UNITS).contains(&units) {
        return Err(EngineError::validation_with(
            format!("units must be between 1 and {}", MAX_UNITS),
            serde_json::json!({ "units": units }),
        ));
    }
    Ok(())
}

pub fn check_numeric_grade(n: f64) -> EngineResult<()> {
    if !n.is_finite() || !(MIN_NUMERIC_GRADE..=MAX_NUMERIC_GRADE).contains(&n) {
        return Err(EngineError::validation_with(
            "numericGrade must be between 1.0 and 5.0",
            serde_json::json!({ "numericGrade": n }),
        ));
    }
    Ok(())
}

/// Units-weighted mean of the numeric grades. Records without a numeric
/// grade or units are ignored; `None` when nothing qualifies.
pub fn weighted_gpa<'a, I>(records: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a GradeRecord>,
{
    let mut points = 0.0;
    let mut units = 0.0;
    for r in records {
        if let (Some(u), Some(g)) = (r.units, compute_gpa(r.units, r.numeric_grade)) {
            points += g;
            units += u as f64;
        }
    }
    if units <= 0.0 {
        return None;
    }
    Some(points / units)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeStatistics {
    pub total: usize,
    pub encoded: usize,
    pub released: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
}

pub fn grade_statistics<'a, I>(roster_size: usize, records: I) -> GradeStatistics
where
    I: IntoIterator<Item = &'a GradeRecord>,
{
    let mut encoded = 0;
    let mut released = 0;
    let mut sum = 0.0;
    let mut n = 0usize;
    for r in records {
        if r.is_encoded() {
            encoded += 1;
            if let Some(v) = r.numeric_grade {
                sum += v;
                n += 1;
            }
        }
        if r.is_released {
            released += 1;
        }
    }
    GradeStatistics {
        total: roster_size,
        encoded,
        released,
        average: if n > 0 { Some(sum / n as f64) } else { None },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_grade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_percentage: Option<f64>,
}

impl GradeValidation {
    fn invalid() -> Self {
        Self {
            valid: false,
            letter_grade: None,
            numeric_grade: None,
            original_percentage: None,
        }
    }
}

/// Accepts a letter code, a grade-scale value in `[1.0, 5.0]`, or a
/// percentage in `[0, 100]` (mapped with `5.0 - pct / 20.0`).
pub fn validate_grade_input(raw: &str) -> GradeValidation {
    let t = raw.trim();
    if t.is_empty() {
        return GradeValidation::invalid();
    }

    if let Ok(n) = t.parse::<f64>() {
        if !n.is_finite() {
            return GradeValidation::invalid();
        }
        if (MIN_NUMERIC_GRADE..=MAX_NUMERIC_GRADE).contains(&n) {
            return GradeValidation {
                valid: true,
                letter_grade: LetterGrade::from_numeric(n).map(|g| g.code().to_string()),
                numeric_grade: Some(n),
                original_percentage: None,
            };
        }
        if (0.0..=100.0).contains(&n) {
            let converted = MAX_NUMERIC_GRADE - n / 20.0;
            return GradeValidation {
                valid: true,
                letter_grade: LetterGrade::from_numeric(converted).map(|g| g.code().to_string()),
                numeric_grade: Some(converted),
                original_percentage: Some(n),
            };
        }
        return GradeValidation::invalid();
    }

    match LetterGrade::parse(t) {
        Some(g) => GradeValidation {
            valid: true,
            letter_grade: Some(g.code().to_string()),
            numeric_grade: g.numeric(),
            original_percentage: None,
        },
        None => GradeValidation::invalid(),
    }
}

/// Number or numeric string; anything non-finite is rejected.
pub fn lenient_f64(v: &serde_json::Value) -> Option<f64> {
    let n = match v {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn lenient_units(v: &serde_json::Value) -> Option<i64> {
    let n = match v {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => integral(n.as_f64()?)?,
        },
        serde_json::Value::String(s) => {
            let t = s.trim();
            match t.parse::<i64>() {
                Ok(i) => i,
                Err(_) => integral(t.parse::<f64>().ok()?)?,
            }
        }
        _ => return None,
    };
    (1..=MAX_UNITS).contains(&n).then_some(n)
}

// `as` saturates, so anything outside the i64 range is refused before the cast.
fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

//! Read-only summaries over the whole school.
//!
//! Every report needs table-wide read access to the student data, so only
//! principals and teachers get past the gate. The numbers follow the school's
//! long-standing conventions: attendance is counted against a fixed number of
//! school days and averages are rounded to two decimals.

use crate::error::{StoreError, StoreResult};
use crate::policy::{gate, Gate, Operation, Scope, Table};
use crate::store::attendance;
use crate::store::grades;
use crate::store::marks::{self, MarkRow};
use crate::store::students::{self, StudentFilter, StudentRow};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn share(days: usize, school_days: u32) -> f64 {
    if school_days == 0 {
        return 0.0;
    }
    days as f64 / f64::from(school_days) * 100.0
}

fn mean(scores: &[i64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<i64>() as f64 / scores.len() as f64
}

fn percentage(days: usize, school_days: u32) -> f64 {
    round2(share(days, school_days))
}

fn average(scores: &[i64]) -> f64 {
    round2(mean(scores))
}

/// Gate shared by every report: table-wide reads on students, marks, grades
/// and attendance.
fn report_gate(conn: &Connection, caller: &str) -> StoreResult<Gate> {
    let g = gate(conn, caller, Table::Students, Operation::Select)?;
    g.require_all()?;
    for table in [Table::Marks, Table::Grades, Table::Attendance] {
        g.on(table, Operation::Select).require_all()?;
    }
    Ok(g)
}

fn count(conn: &Connection, sql: &str) -> StoreResult<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

fn distinct(rows: &[StudentRow]) -> (Vec<String>, Vec<String>) {
    let mut classes: Vec<String> = rows.iter().map(|s| s.class_name.clone()).collect();
    let mut sections: Vec<String> = rows.iter().map(|s| s.section.clone()).collect();
    classes.sort();
    classes.dedup();
    sections.sort();
    sections.dedup();
    (classes, sections)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_students: i64,
    pub total_teachers: i64,
    /// Only present for callers who may read accounts.
    pub total_accounts: Option<i64>,
    pub students_with_face_data: i64,
    pub total_attendance_records: i64,
    pub total_classes: usize,
    pub total_sections: usize,
    pub classes: Vec<String>,
    pub sections: Vec<String>,
}

pub fn statistics(conn: &Connection, caller: &str) -> StoreResult<Statistics> {
    let g = report_gate(conn, caller)?;
    let total_accounts = if g.on(Table::Accounts, Operation::Select).scope == Scope::All {
        Some(count(conn, "SELECT COUNT(*) FROM accounts")?)
    } else {
        None
    };

    let rows = students::query(conn, &StudentFilter::default(), None)?;
    let (classes, sections) = distinct(&rows);
    Ok(Statistics {
        total_students: rows.len() as i64,
        total_teachers: count(conn, "SELECT COUNT(*) FROM teachers")?,
        total_accounts,
        students_with_face_data: rows.iter().filter(|s| s.has_face_data).count() as i64,
        total_attendance_records: count(conn, "SELECT COUNT(*) FROM attendance")?,
        total_classes: classes.len(),
        total_sections: sections.len(),
        classes,
        sections,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub class_name: String,
    pub section: String,
    pub total_students: usize,
    pub students_with_face_data: usize,
    pub students_with_marks: usize,
    pub students_with_grades: usize,
    pub average_marks: f64,
    pub students: Vec<StudentRow>,
}

pub fn class_statistics(
    conn: &Connection,
    caller: &str,
    class_name: &str,
    section: &str,
) -> StoreResult<ClassStatistics> {
    report_gate(conn, caller)?;
    let filter = StudentFilter {
        class_name: Some(class_name.to_string()),
        section: Some(section.to_string()),
    };
    let rows = students::query(conn, &filter, None)?;
    if rows.is_empty() {
        return Err(StoreError::NotFound("class section"));
    }

    let mut all_scores = Vec::new();
    let mut with_marks = 0;
    let mut with_grades = 0;
    for s in &rows {
        let m = marks::for_student(conn, s.id)?;
        if !m.is_empty() {
            with_marks += 1;
        }
        all_scores.extend(m.iter().map(|r| r.score));
        if !grades::for_student(conn, s.id)?.is_empty() {
            with_grades += 1;
        }
    }

    Ok(ClassStatistics {
        class_name: class_name.trim().to_string(),
        section: section.trim().to_string(),
        total_students: rows.len(),
        students_with_face_data: rows.iter().filter(|s| s.has_face_data).count(),
        students_with_marks: with_marks,
        students_with_grades: with_grades,
        average_marks: average(&all_scores),
        students: rows,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentRow,
    pub attendance_percentage: f64,
    pub average_marks: f64,
    pub grade_distribution: BTreeMap<String, usize>,
    pub total_subjects: usize,
    pub total_attendance_days: usize,
}

pub fn student_report(
    conn: &Connection,
    caller: &str,
    student_id: i64,
    school_days: u32,
) -> StoreResult<StudentReport> {
    report_gate(conn, caller)?;
    let student = students::fetch(conn, student_id)?.ok_or(StoreError::NotFound("student"))?;
    let scores: Vec<i64> = marks::for_student(conn, student_id)?
        .iter()
        .map(|m| m.score)
        .collect();
    let days = attendance::for_student(conn, student_id)?.len();

    let mut grade_distribution = BTreeMap::new();
    for g in grades::for_student(conn, student_id)? {
        *grade_distribution.entry(g.grade).or_insert(0) += 1;
    }

    Ok(StudentReport {
        student,
        attendance_percentage: percentage(days, school_days),
        average_marks: average(&scores),
        grade_distribution,
        total_subjects: scores.len(),
        total_attendance_days: days,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLine {
    pub student: StudentRow,
    pub attendance_days: usize,
    pub attendance_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filtered<T> {
    pub rows: Vec<T>,
    /// Every class and section in the school, for building filters.
    pub classes: Vec<String>,
    pub sections: Vec<String>,
}

fn filtered<T>(
    conn: &Connection,
    filter: &StudentFilter,
    mut line: impl FnMut(StudentRow) -> StoreResult<T>,
) -> StoreResult<Filtered<T>> {
    let (classes, sections) = distinct(&students::query(conn, &StudentFilter::default(), None)?);
    let rows = students::query(conn, filter, None)?
        .into_iter()
        .map(&mut line)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(Filtered {
        rows,
        classes,
        sections,
    })
}

pub fn attendance_report(
    conn: &Connection,
    caller: &str,
    filter: &StudentFilter,
    school_days: u32,
) -> StoreResult<Filtered<AttendanceLine>> {
    report_gate(conn, caller)?;
    let mut out = filtered(conn, filter, |student| {
        let days = attendance::for_student(conn, student.id)?.len();
        Ok(AttendanceLine {
            student,
            attendance_days: days,
            attendance_percentage: percentage(days, school_days),
        })
    })?;
    // Stable sort keeps name order among equal percentages.
    out.rows
        .sort_by(|a, b| b.attendance_percentage.total_cmp(&a.attendance_percentage));
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicLine {
    pub student: StudentRow,
    pub average_marks: f64,
    pub total_subjects: usize,
    pub grade_count: usize,
}

pub fn academic_report(
    conn: &Connection,
    caller: &str,
    filter: &StudentFilter,
) -> StoreResult<Filtered<AcademicLine>> {
    report_gate(conn, caller)?;
    let mut out = filtered(conn, filter, |student| {
        let scores: Vec<i64> = marks::for_student(conn, student.id)?
            .iter()
            .map(|m| m.score)
            .collect();
        Ok(AcademicLine {
            average_marks: average(&scores),
            total_subjects: scores.len(),
            grade_count: grades::for_student(conn, student.id)?.len(),
            student,
        })
    })?;
    out.rows
        .sort_by(|a, b| b.average_marks.total_cmp(&a.average_marks));
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub performance_level: &'static str,
    pub overall_assessment: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// Absent when the student has no marks.
    pub trend_analysis: Option<&'static str>,
    pub attendance_impact: &'static str,
    pub recommendations: Vec<String>,
}

/// Rule-based reading of one student's marks and attendance. Bands compare
/// the unrounded `average` and `attendance_pct`.
pub fn analyze(name: &str, marks: &[MarkRow], average: f64, attendance_pct: f64) -> Insights {
    let (performance_level, assessment) = match average {
        a if a >= 90.0 => (
            "Excellent",
            "is performing exceptionally well with an average of {avg}%. This student demonstrates strong academic capabilities.",
        ),
        a if a >= 80.0 => (
            "Good",
            "is performing well with an average of {avg}%. There is room for improvement but overall solid performance.",
        ),
        a if a >= 70.0 => (
            "Average",
            "has average performance with {avg}%. This student needs additional support to improve.",
        ),
        a if a >= 60.0 => (
            "Below Average",
            "is struggling academically with {avg}%. Immediate intervention is recommended.",
        ),
        _ => (
            "Needs Improvement",
            "requires significant academic support with {avg}%. Urgent attention needed.",
        ),
    };
    // Debug keeps the trailing ".0" on whole averages.
    let shown = format!("{average:?}");
    let overall_assessment = format!("{name} {}", assessment.replace("{avg}", &shown));

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut recommendations = Vec::new();
    let mut trend_analysis = None;

    // First best and first worst, in subject order.
    let best = marks.iter().reduce(|b, m| if m.score > b.score { m } else { b });
    let worst = marks.iter().reduce(|w, m| if m.score < w.score { m } else { w });
    if let (Some(best), Some(worst)) = (best, worst) {
        if best.score >= 85 {
            strengths.push(format!("Excels in {} with {}%", best.subject, best.score));
        } else if best.score >= 75 {
            strengths.push(format!("Shows potential in {} with {}%", best.subject, best.score));
        }
        if worst.score < 70 {
            weaknesses.push(format!("Struggles in {} with {}%", worst.subject, worst.score));
            recommendations.push(format!("Provide additional support in {}", worst.subject));
        }

        let high = marks.iter().filter(|m| m.score >= 80).count();
        let low = marks.iter().filter(|m| m.score < 70).count();
        trend_analysis = Some(match high.cmp(&low) {
            std::cmp::Ordering::Greater => "Student shows consistent performance across most subjects",
            std::cmp::Ordering::Less => "Student needs improvement in multiple subjects",
            std::cmp::Ordering::Equal => "Mixed performance across subjects",
        });
    }

    let attendance_impact = if attendance_pct >= 95.0 {
        "Excellent attendance - this positively contributes to academic performance"
    } else if attendance_pct >= 85.0 {
        "Good attendance - consistent presence supports learning"
    } else if attendance_pct >= 75.0 {
        "Moderate attendance - irregular attendance may affect performance"
    } else {
        recommendations.push("Address attendance issues to improve academic outcomes".into());
        "Poor attendance - this significantly impacts academic performance"
    };

    if average < 75.0 {
        recommendations.push("Consider additional tutoring or remedial classes".into());
        recommendations.push("Implement regular progress monitoring".into());
    }
    if attendance_pct < 80.0 {
        recommendations.push("Develop attendance improvement plan".into());
    }
    if recommendations.is_empty() {
        recommendations.push("Continue current academic support strategies".into());
        recommendations.push("Encourage participation in advanced learning opportunities".into());
    }

    Insights {
        performance_level,
        overall_assessment,
        strengths,
        weaknesses,
        trend_analysis,
        attendance_impact,
        recommendations,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassComparison {
    pub student_count: usize,
    pub average_marks: Option<f64>,
    pub max_marks: Option<i64>,
    pub min_marks: Option<i64>,
    /// Mean attendance days over students with at least one record.
    pub average_attendance_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInsights {
    pub student: StudentRow,
    pub average_marks: f64,
    pub max_marks: i64,
    pub min_marks: i64,
    pub subject_performance: BTreeMap<String, i64>,
    pub grades: BTreeMap<String, String>,
    pub attendance_days: usize,
    pub attendance_percentage: f64,
    pub insights: Insights,
    pub class_comparison: Option<ClassComparison>,
}

fn compare(conn: &Connection, filter: &StudentFilter) -> StoreResult<ClassComparison> {
    let rows = students::query(conn, filter, None)?;
    let mut scores = Vec::new();
    let mut day_counts = Vec::new();
    for s in &rows {
        scores.extend(marks::for_student(conn, s.id)?.iter().map(|m| m.score));
        let days = attendance::for_student(conn, s.id)?.len();
        if days > 0 {
            day_counts.push(days);
        }
    }
    Ok(ClassComparison {
        student_count: rows.len(),
        average_marks: (!scores.is_empty()).then(|| average(&scores)),
        max_marks: scores.iter().copied().max(),
        min_marks: scores.iter().copied().min(),
        average_attendance_days: (!day_counts.is_empty())
            .then(|| round2(day_counts.iter().sum::<usize>() as f64 / day_counts.len() as f64)),
    })
}

/// Insights for one student, compared against `filter` when it names a class
/// or section.
pub fn insights(
    conn: &Connection,
    caller: &str,
    student_id: i64,
    filter: &StudentFilter,
    school_days: u32,
) -> StoreResult<StudentInsights> {
    report_gate(conn, caller)?;
    let student = students::fetch(conn, student_id)?.ok_or(StoreError::NotFound("student"))?;
    let marks = marks::for_student(conn, student_id)?;
    let scores: Vec<i64> = marks.iter().map(|m| m.score).collect();
    let days = attendance::for_student(conn, student_id)?.len();
    let avg = mean(&scores);
    let pct = share(days, school_days);

    let class_comparison = if filter.class_name.is_some() || filter.section.is_some() {
        Some(compare(conn, filter)?)
    } else {
        None
    };

    Ok(StudentInsights {
        insights: analyze(&student.name, &marks, avg, pct),
        average_marks: round2(avg),
        max_marks: scores.iter().copied().max().unwrap_or(0),
        min_marks: scores.iter().copied().min().unwrap_or(0),
        subject_performance: marks.iter().map(|m| (m.subject.clone(), m.score)).collect(),
        grades: grades::for_student(conn, student_id)?
            .into_iter()
            .map(|g| (g.subject, g.grade))
            .collect(),
        attendance_days: days,
        attendance_percentage: round2(pct),
        class_comparison,
        student,
    })
}

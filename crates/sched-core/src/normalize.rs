use crate::domain::*;
use crate::error::ScheduleError;
use sched_types::{CourseType, RawInstance};
use std::collections::{HashMap, HashSet};

const LUNCH_START_MIN: i64 = 12 * 60;
const LUNCH_END_MIN: i64 = 12 * 60 + 30;

fn parse_hhmm(s: &str) -> Option<i64> {
    let (h, m) = s.split_once(':')?;
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    if !(0..24).contains(&h) || !(0..60).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Parses a raw wire instance into a validated, fully-derived `ProblemInstance`.
/// Accumulates every violation before returning a single `InvalidInput` rather
/// than failing fast on the first one found.
pub fn normalize(raw: &RawInstance) -> Result<ProblemInstance, ScheduleError> {
    let mut errors: Vec<String> = Vec::new();

    if raw.term_config.num_weeks == 0 {
        errors.push("term_config.num_weeks must be > 0".into());
    }
    if raw.term_config.days.is_empty() {
        errors.push("term_config.days is empty".into());
    }
    {
        let mut seen = HashSet::new();
        for d in &raw.term_config.days {
            if !seen.insert(d.as_str()) {
                errors.push(format!("duplicate day label: {d}"));
            }
        }
    }
    if raw.term_config.period_length_minutes == 0 {
        errors.push("term_config.period_length_minutes must be > 0".into());
    }

    let start = parse_hhmm(&raw.term_config.day_start_time);
    let end = parse_hhmm(&raw.term_config.day_end_time);
    if start.is_none() {
        errors.push(format!(
            "invalid day_start_time: {}",
            raw.term_config.day_start_time
        ));
    }
    if end.is_none() {
        errors.push(format!(
            "invalid day_end_time: {}",
            raw.term_config.day_end_time
        ));
    }

    let num_periods: u32 = match (start, end) {
        (Some(s), Some(e)) if e > s && raw.term_config.period_length_minutes > 0 => {
            let p = (e - s) / raw.term_config.period_length_minutes as i64;
            if p <= 0 {
                errors.push("term_config time range produces zero periods".into());
                0
            } else {
                p as u32
            }
        }
        _ => {
            if start.is_some() && end.is_some() {
                errors.push("term_config day_end_time must be after day_start_time".into());
            }
            0
        }
    };

    {
        let mut seen = HashSet::new();
        for c in &raw.classrooms {
            if !seen.insert(c.id.0.clone()) {
                errors.push(format!("duplicate classroom id: {}", c.id.0));
            }
        }
    }
    let instructor_idx: HashMap<&str, usize> = {
        let mut seen = HashSet::new();
        let mut map = HashMap::new();
        for (i, ins) in raw.instructors.iter().enumerate() {
            if !seen.insert(ins.id.0.clone()) {
                errors.push(format!("duplicate instructor id: {}", ins.id.0));
            }
            map.insert(ins.id.0.as_str(), i);
        }
        map
    };
    let course_idx: HashMap<&str, usize> = {
        let mut seen = HashSet::new();
        let mut map = HashMap::new();
        for (i, c) in raw.courses.iter().enumerate() {
            if !seen.insert(c.id.0.clone()) {
                errors.push(format!("duplicate course id: {}", c.id.0));
            }
            map.insert(c.id.0.as_str(), i);
        }
        map
    };
    let day_idx: HashMap<&str, usize> = raw
        .term_config
        .days
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let num_days = raw.term_config.days.len();

    let mut instructors = Vec::with_capacity(raw.instructors.len());
    for ins in &raw.instructors {
        let mut avail = vec![vec![true; num_periods as usize]; num_days];
        if !ins.availability.is_empty() {
            for row in avail.iter_mut() {
                row.iter_mut().for_each(|b| *b = false);
            }
            for slot in &ins.availability {
                let Some(&d) = day_idx.get(slot.day.as_str()) else {
                    errors.push(format!(
                        "instructor {} availability references unknown day {}",
                        ins.id.0, slot.day
                    ));
                    continue;
                };
                if slot.period_index >= num_periods {
                    errors.push(format!(
                        "instructor {} availability period_index {} out of range (num_periods={})",
                        ins.id.0, slot.period_index, num_periods
                    ));
                    continue;
                }
                avail[d][slot.period_index as usize] = true;
            }
        }
        instructors.push(InstructorData {
            id: ins.id.clone(),
            name: ins.name.clone(),
            avail,
            back_to_back_preference: ins.back_to_back_preference,
            lunch_penalty: if ins.allow_lunch_teaching { 0.0 } else { 1.0 },
        });
    }

    let half_point = raw.term_config.num_weeks / 2;
    let num_weeks = raw.term_config.num_weeks;
    let block_weight = [half_point, num_weeks.saturating_sub(half_point)];

    let period_length = raw.term_config.period_length_minutes;
    let mut courses = Vec::with_capacity(raw.courses.len());
    for c in &raw.courses {
        let Some(&instructor_i) = instructor_idx.get(c.instructor_id.0.as_str()) else {
            errors.push(format!(
                "course {} references missing instructor {}",
                c.id.0, c.instructor_id.0
            ));
            continue;
        };

        let (required_minutes, week_start, week_end): (u32, u32, u32) = match c.course_type {
            CourseType::FullTerm => (90, 1, num_weeks),
            CourseType::FirstHalfTerm => (180, 1, half_point),
            CourseType::SecondHalfTerm => (180, half_point + 1, num_weeks),
        };
        let periods_per_session = if period_length == 0 {
            0
        } else {
            (required_minutes + period_length - 1) / period_length
        };
        let active_weeks = week_end.saturating_sub(week_start).saturating_add(1);
        let total_sessions = active_weeks;
        let sessions_per_week = if active_weeks == 0 {
            0
        } else {
            (total_sessions + active_weeks - 1) / active_weeks
        };

        let mut blocks = Vec::new();
        let (b1_start, b1_end) = (1u32, half_point);
        let (b2_start, b2_end) = (half_point + 1, num_weeks);
        if b1_end >= b1_start && week_start <= b1_end && week_end >= b1_start {
            blocks.push(BLOCK_1);
        }
        if b2_end >= b2_start && week_start <= b2_end && week_end >= b2_start {
            blocks.push(BLOCK_2);
        }
        if blocks.is_empty() {
            errors.push(format!(
                "course {} has no active block for its week range [{},{}]",
                c.id.0, week_start, week_end
            ));
        }

        courses.push(CourseData {
            id: c.id.clone(),
            name: c.name.clone(),
            instructor_idx: instructor_i,
            expected_enrollment: c.expected_enrollment,
            course_type: c.course_type,
            periods_per_session,
            total_sessions,
            week_start,
            week_end,
            sessions_per_week,
            blocks,
        });
    }

    let mut students_cc = StudentConflictMatrix::new();
    for student in &raw.students {
        let mut idxs: Vec<usize> = Vec::new();
        let mut seen_in_student = HashSet::new();
        for cid in &student.enrolled_course_ids {
            let Some(&i) = course_idx.get(cid.0.as_str()) else {
                errors.push(format!("student enrollment references unknown course {}", cid.0));
                continue;
            };
            if seen_in_student.insert(i) {
                idxs.push(i);
            }
        }
        for a in 0..idxs.len() {
            for b in (a + 1)..idxs.len() {
                students_cc.increment(idxs[a], idxs[b]);
            }
        }
    }

    let w = &raw.conflict_weights;
    for (name, v) in [
        ("global_student_conflict_weight", w.global_student_conflict_weight),
        ("instructor_compactness_weight", w.instructor_compactness_weight),
        ("preferred_time_slots_weight", w.preferred_time_slots_weight),
    ] {
        if v < 0.0 {
            errors.push(format!("conflict_weights.{name} must be non-negative"));
        }
    }

    if !errors.is_empty() {
        tracing::debug!(count = errors.len(), "normalize rejected raw instance");
        return Err(ScheduleError::invalid(errors));
    }

    let mut lunch_periods = Vec::new();
    for p in 1..=num_periods {
        let p_start = start.unwrap() + (p as i64 - 1) * period_length as i64;
        let p_end = p_start + period_length as i64;
        if p_start < LUNCH_END_MIN && p_end > LUNCH_START_MIN {
            lunch_periods.push(p);
        }
    }

    let term = TermDerived {
        num_weeks,
        days: raw.term_config.days.clone(),
        num_periods,
        lunch_periods,
        period_length_minutes: period_length,
        half_point,
        block_weight,
    };

    let classrooms = raw
        .classrooms
        .iter()
        .map(|c| ClassroomData {
            id: c.id.clone(),
            name: c.name.clone(),
            capacity: c.capacity,
        })
        .collect();

    let weights = Weights {
        w1: w.global_student_conflict_weight,
        w2: w.instructor_compactness_weight,
        w3: w.preferred_time_slots_weight,
    };

    tracing::info!(
        courses = courses.len(),
        classrooms = classrooms.len(),
        instructors = instructors.len(),
        "normalized raw instance"
    );

    Ok(ProblemInstance {
        term,
        classrooms,
        instructors,
        courses,
        students_cc,
        weights,
    })
}

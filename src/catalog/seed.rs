//! Built-in sample catalog for the computer science program.
//!
//! Used by `course-advisor seed`, by the CLI when no database is configured,
//! and as a fixture throughout the tests.

use super::{
    Catalog, Course, CourseCategory, CourseCode, Policy, PolicyScope, PrerequisiteEdge,
    ScopeKind, Track,
};

fn code(dept: &str, number: u32) -> CourseCode {
    CourseCode::new(dept, number)
}

fn course(dept: &str, number: u32, title: &str, credits: u8, category: CourseCategory) -> Course {
    Course {
        code: code(dept, number),
        title: title.to_string(),
        credits,
        category,
        description: String::new(),
    }
}

fn policy(kind: ScopeKind, scope: &str, key: &str, value: &str, description: &str) -> Policy {
    Policy {
        scope: PolicyScope::new(kind, scope),
        key: key.to_string(),
        value: value.to_string(),
        description: description.to_string(),
    }
}

fn requires(course: (&str, u32), required: &[(&str, u32)]) -> Vec<PrerequisiteEdge> {
    required
        .iter()
        .map(|(dept, number)| {
            PrerequisiteEdge::mandatory(code(course.0, course.1), code(dept, *number))
        })
        .collect()
}

fn courses() -> Vec<Course> {
    use CourseCategory::{Core, Elective, Track};

    let mut courses = vec![
        course("CS", 18000, "Problem Solving and Object-Oriented Programming", 4, Core),
        course("CS", 18200, "Foundations of Computer Science", 3, Core),
        course("CS", 24000, "Programming in C", 3, Core),
        course("CS", 25000, "Computer Architecture", 4, Core),
        course("CS", 25100, "Data Structures and Algorithms", 3, Core),
        course("CS", 25200, "Systems Programming", 4, Core),
        course("CS", 30700, "Software Engineering I", 3, Track),
        course("CS", 34800, "Information Systems", 3, Elective),
        course("CS", 35200, "Compilers: Principles and Practice", 3, Elective),
        course("CS", 35400, "Operating Systems", 3, Elective),
        course("CS", 37300, "Data Mining and Machine Learning", 3, Track),
        course("CS", 38100, "Introduction to the Analysis of Algorithms", 3, Core),
        course("CS", 40700, "Software Engineering Senior Project", 3, Track),
        course("CS", 40800, "Software Testing", 3, Track),
        course("CS", 42200, "Computer Networks", 3, Elective),
        course("CS", 47100, "Introduction to Artificial Intelligence", 3, Track),
        course("CS", 47300, "Web Information Search and Management", 3, Elective),
        course("MA", 16100, "Plane Analytic Geometry and Calculus I", 5, Core),
        course("MA", 16200, "Plane Analytic Geometry and Calculus II", 5, Core),
        course("MA", 26100, "Multivariate Calculus", 4, Core),
        course("MA", 26500, "Linear Algebra", 3, Core),
        course("STAT", 35000, "Introduction to Statistics", 3, Core),
        course("STAT", 51100, "Statistical Methods", 3, Elective),
        course("PHYS", 17200, "Modern Mechanics", 4, Core),
    ];
    if let Some(cs180) = courses.first_mut() {
        cs180.description =
            "Problem solving and algorithms, implementation of algorithms in a high level \
             programming language, conditionals, iteration, recursion, objects and classes."
                .to_string();
    }
    courses
}

fn edges() -> Vec<PrerequisiteEdge> {
    let mut edges = Vec::new();
    edges.extend(requires(("CS", 18200), &[("CS", 18000), ("MA", 16100)]));
    edges.extend(requires(("CS", 24000), &[("CS", 18000)]));
    edges.extend(requires(("CS", 25000), &[("CS", 18200), ("CS", 24000)]));
    edges.extend(requires(("CS", 25100), &[("CS", 18200), ("CS", 24000)]));
    edges.extend(requires(("CS", 25200), &[("CS", 25000), ("CS", 25100)]));
    edges.extend(requires(("CS", 30700), &[("CS", 25200)]));
    edges.extend(requires(("CS", 34800), &[("CS", 25100)]));
    edges.extend(requires(("CS", 35200), &[("CS", 25200)]));
    edges.extend(requires(("CS", 35400), &[("CS", 25200)]));
    edges.extend(requires(("CS", 37300), &[("CS", 25100)]));
    edges.extend(requires(("CS", 38100), &[("CS", 25100)]));
    edges.extend(requires(("CS", 40700), &[("CS", 30700)]));
    edges.extend(requires(("CS", 40800), &[("CS", 30700)]));
    edges.extend(requires(("CS", 42200), &[("CS", 25200)]));
    edges.extend(requires(("CS", 47100), &[("CS", 38100)]));
    edges.extend(requires(("CS", 47300), &[("CS", 25100)]));
    edges.extend(requires(("MA", 16200), &[("MA", 16100)]));
    edges.extend(requires(("MA", 26100), &[("MA", 16200)]));
    edges.extend(requires(("MA", 26500), &[("MA", 16200)]));
    edges.extend(requires(("STAT", 35000), &[("MA", 16200)]));
    edges.extend(requires(("STAT", 51100), &[("MA", 16200)]));

    // Algorithms needs one of the two second-year math courses, and data
    // mining one of the two statistics courses.
    edges.push(PrerequisiteEdge::either_of(code("CS", 38100), code("MA", 26100), "math"));
    edges.push(PrerequisiteEdge::either_of(code("CS", 38100), code("MA", 26500), "math"));
    edges.push(PrerequisiteEdge::either_of(code("CS", 37300), code("STAT", 35000), "stats"));
    edges.push(PrerequisiteEdge::either_of(code("CS", 37300), code("STAT", 51100), "stats"));

    edges.push(PrerequisiteEdge::corequisite(code("PHYS", 17200), code("MA", 16100)));
    edges
}

fn tracks() -> Vec<Track> {
    vec![
        Track {
            id: "machine_intelligence".to_string(),
            name: "Machine Intelligence".to_string(),
            required: vec![code("CS", 37300), code("CS", 38100), code("CS", 47100)],
            electives: vec![
                code("CS", 47300),
                code("CS", 34800),
                code("CS", 35400),
                code("CS", 42200),
            ],
            min_electives: 2,
            aliases: vec!["mi".to_string(), "machine intelligence".to_string()],
        },
        Track {
            id: "software_engineering".to_string(),
            name: "Software Engineering".to_string(),
            required: vec![
                code("CS", 30700),
                code("CS", 38100),
                code("CS", 40700),
                code("CS", 40800),
            ],
            electives: vec![
                code("CS", 35200),
                code("CS", 35400),
                code("CS", 42200),
                code("CS", 34800),
            ],
            min_electives: 1,
            aliases: vec!["se".to_string(), "software engineering".to_string()],
        },
    ]
}

fn policies() -> Vec<Policy> {
    use ScopeKind::{CourseLoad, Major, Track, Transfer};

    let mut policies = vec![
        policy(Transfer, "cs", "minimum_gpa", "2.75", "Cumulative GPA required to change into CS"),
        policy(Transfer, "cs", "minimum_grade_cs_18000", "B", "Minimum grade in CS 18000"),
        policy(
            Transfer,
            "cs",
            "math_requirement",
            "B or better in one of MA 16100, MA 16200, MA 26100, MA 26500",
            "Math grade requirement",
        ),
        policy(Transfer, "cs", "minimum_semesters", "1", "Semesters completed on campus"),
        policy(Transfer, "cs", "minimum_credits", "12", "Credit hours completed on campus"),
        policy(Major, "cs", "good_standing_gpa", "2.0", "GPA for good academic standing"),
        policy(Major, "cs", "total_credits", "120", "Credits required to graduate"),
        policy(Major, "cs", "minimum_core_grade", "C", "Minimum grade in each core course"),
        policy(Major, "cs", "deans_list_gpa", "3.5", "Semester GPA for the dean's list"),
        policy(
            Track,
            "machine_intelligence",
            "minimum_track_grade",
            "C",
            "Minimum grade in each track course",
        ),
        policy(
            Track,
            "software_engineering",
            "minimum_track_grade",
            "C",
            "Minimum grade in each track course",
        ),
    ];
    for (level, cs_max) in [
        ("freshman", "2"),
        ("sophomore", "3"),
        ("junior", "3"),
        ("senior", "3"),
        ("summer", "2"),
    ] {
        policies.push(policy(
            CourseLoad,
            level,
            "cs_courses_max",
            cs_max,
            "Maximum CS courses per semester",
        ));
        policies.push(policy(
            CourseLoad,
            level,
            "total_credits_max",
            "18",
            "Maximum credit hours per semester",
        ));
    }
    policies
}

/// The sample catalog.
#[must_use]
pub fn sample_catalog() -> Catalog {
    Catalog {
        courses: courses(),
        edges: edges(),
        tracks: tracks(),
        policies: policies(),
    }
}

use crate::manifest::{Manifest, RenderMode};
use crate::models::{EditableInstall, Entry, Line, Requirement};

pub fn create_manifest() -> Manifest {
    let mut uvicorn = Requirement::pinned("uvicorn", "0.17.6").unwrap();
    uvicorn.extras.push("standard".into());

    Manifest::new(vec![
        Line {
            number: 1,
            entry: Entry::Comment {
                text: "# Deploy-specific pins".into(),
            },
            comment: None,
        },
        Line {
            number: 2,
            entry: Entry::Requirement(Requirement::pinned("fastapi", "0.78.0").unwrap()),
            comment: Some("web".into()),
        },
        Line {
            number: 3,
            entry: Entry::Requirement(uvicorn),
            comment: None,
        },
        Line {
            number: 4,
            entry: Entry::Blank,
            comment: None,
        },
        Line {
            number: 5,
            entry: Entry::Editable(EditableInstall::new(".").unwrap()),
            comment: None,
        },
    ])
}

pub fn assert_manifest(retrieved: &Manifest, generated: &Manifest) {
    assert_eq!(retrieved.lines.len(), generated.lines.len());
    assert_eq!(retrieved.distinct_packages(), generated.distinct_packages());
    assert_eq!(
        retrieved.render(RenderMode::Preserve),
        generated.render(RenderMode::Preserve)
    );
}

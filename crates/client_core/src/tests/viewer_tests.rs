use super::*;

use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::TimeZone;

fn fixed_now() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
        .single()
        .expect("unambiguous local time")
}

fn pdf_response(disposition: Option<&str>) -> BackendResponse {
    BackendResponse {
        status: 200,
        content_type: Some("application/pdf; charset=binary".into()),
        content_disposition: disposition.map(str::to_string),
        body: b"%PDF".to_vec(),
    }
}

#[test]
fn disposition_filename_is_preferred() {
    let document = ReportDocument::from_response(
        pdf_response(Some("attachment; filename=\"relatorio-ana.pdf\"")),
        "Ana",
        fixed_now(),
    );
    assert_eq!(document.filename, "relatorio-ana.pdf");
    assert_eq!(document.content_type, "application/pdf");
    assert_eq!(document.bytes, b"%PDF");
}

#[test]
fn disposition_paths_are_reduced_to_a_file_name() {
    assert_eq!(
        filename_from_disposition("attachment; filename=../../etc/passwd"),
        Some("passwd".to_string())
    );
    assert_eq!(
        filename_from_disposition("inline; FILENAME=\"C:\\\\temp\\\\r.pdf\""),
        Some("r.pdf".to_string())
    );
    assert_eq!(filename_from_disposition("inline"), None);
    assert_eq!(filename_from_disposition("attachment; filename=\"..\""), None);
}

#[test]
fn fallback_filename_uses_owner_and_timestamp() {
    let document =
        ReportDocument::from_response(pdf_response(None), "  Ana Maria Souza ", fixed_now());
    assert_eq!(document.filename, "relatorio-ana-maria-souza-20240309-140507.pdf");

    assert_eq!(
        default_filename("", "application/pdf", fixed_now()),
        "relatorio-20240309-140507.pdf"
    );
}

#[test]
fn missing_content_type_defaults_to_pdf() {
    let mut response = pdf_response(None);
    response.content_type = None;
    let document = ReportDocument::from_response(response, "Ana", fixed_now());
    assert_eq!(document.content_type, "application/pdf");
    assert!(document.filename.ends_with(".pdf"));
}

#[tokio::test]
async fn directory_viewer_saves_without_overwriting() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir()
        .join(format!("questionnaire_viewer_{suffix}"))
        .join("reports");
    let viewer = DirectoryViewer::new(&dir);

    let document = ReportDocument {
        filename: "relatorio.pdf".into(),
        content_type: "application/pdf".into(),
        bytes: b"%PDF-first".to_vec(),
    };
    let first = viewer.open(document.clone()).await.expect("first save");
    let second = viewer
        .open(ReportDocument {
            bytes: b"%PDF-second".to_vec(),
            ..document
        })
        .await
        .expect("second save");

    let first_path = first.location.expect("first path");
    let second_path = second.location.expect("second path");
    assert_eq!(first_path, dir.join("relatorio.pdf"));
    assert_eq!(second_path, dir.join("relatorio-1.pdf"));
    assert_eq!(fs::read(&first_path).expect("read first"), b"%PDF-first");
    assert_eq!(fs::read(&second_path).expect("read second"), b"%PDF-second");
    assert_eq!(second.size_bytes, b"%PDF-second".len());
    assert_ne!(first.id, second.id);

    fs::remove_dir_all(dir.parent().expect("parent")).expect("cleanup");
}

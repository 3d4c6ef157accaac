//! Image-packaged functions are unpacked through their Dockerfile.

mod common;

use common::Project;
use localgw_lib::classify;
use serde_json::json;

const TEMPLATE: &str = r#"
Resources:
  Reports:
    Type: AWS::Serverless::Function
    Properties:
      PackageType: Image
      Events:
        Get:
          Type: Api
          Properties: {Path: /reports, Method: get}
    Metadata:
      DockerContext: ./reports
      Dockerfile: Dockerfile
      DockerTag: python3.12-v1
"#;

#[test]
fn dockerfile_supplies_handler_code_and_environment() {
    let project = Project::new();
    project.write("reports/src/app.py", "def handler(event, context): pass\n");
    project.write("reports/shared/fmt.py", "WIDTH = 80\n");
    project.write(
        "reports/Dockerfile",
        "FROM public.ecr.aws/lambda/python:3.12\n\
         COPY src/app.py ./\n\
         COPY shared/ ./\n\
         ENV REPORT_BUCKET=reports\n\
         CMD [\"app.handler\"]\n",
    );

    let buckets = classify(&project.serverless(TEMPLATE)).unwrap();
    let props = &buckets.route("/reports", "get").unwrap()["Properties"];
    assert_eq!(props["Handler"], json!("app.handler"));
    assert_eq!(props["CodeUri"], json!("reports/src/"));
    assert_eq!(props["Layers"], json!(["reports/shared/"]));
    assert_eq!(props["Environment"]["Variables"]["REPORT_BUCKET"], json!("reports"));
}

#[test]
fn unreadable_dockerfile_leaves_placeholders() {
    let project = Project::new();
    project.write("reports/Dockerfile", "FROM base\nCOPY --from=build /out ./\n");

    let buckets = classify(&project.serverless(TEMPLATE)).unwrap();
    let props = &buckets.route("/reports", "get").unwrap()["Properties"];
    assert!(props["CodeUri"].as_str().unwrap().starts_with("edit here!"));
    assert!(props["Handler"].as_str().unwrap().starts_with("edit here!"));
    assert_eq!(props["Environment"]["Variables"]["SAMPLE_ENV"], json!("VAL"));
}

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const OPERATOR_ANSWERS: &str = "us-west-2\ndemo-1\npassword123\n";

/// Isolated run: its own cwd, work dir, PATH and tool-call log.
pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub bin: PathBuf,
    pub work: PathBuf,
    pub app: PathBuf,
    pub log: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let bin = root.join("bin");
        fs::create_dir_all(&bin).expect("create bin dir");
        let app = make_fixture_app(&root);
        Self {
            root: root.clone(),
            bin,
            work: root.join("work"),
            app,
            log: root.join("calls.log"),
            _tmp: tmp,
        }
    }

    /// PATH holds only the stub directory; nothing from the host leaks in.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("rangectl");
        cmd.current_dir(&self.root)
            .env("PATH", &self.bin)
            .env("HOME", &self.root)
            .env_remove("RUST_LOG")
            .arg("--work-dir")
            .arg(&self.work);
        cmd
    }

    pub fn write_config(&self, extra: &str) -> PathBuf {
        let path = self.root.join("rangectl.toml");
        let body = format!(
            "app_source = \"{}\"\nprobe_endpoint = false\nendpoint_attempts = 1\n{}",
            self.app.display(),
            extra
        );
        fs::write(&path, body).expect("write config");
        path
    }

    pub fn run_json(&self, args: &[&str], stdin: &str) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .write_stdin(stdin)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn calls(&self) -> String {
        fs::read_to_string(&self.log).unwrap_or_default()
    }

    /// Stub every required tool with a shell script that logs its argv and
    /// answers like the real CLI would against an empty account.
    /// `cluster_exists` controls `aws eks update-kubeconfig`.
    #[cfg(unix)]
    pub fn install_stub_tools(&self, cluster_exists: bool) {
        let log = self.log.display().to_string();
        let eks = if cluster_exists {
            "echo \"Updated context\""
        } else {
            "echo \"An error occurred (ResourceNotFoundException) when calling the DescribeCluster operation: No cluster found for name: demo-1-cluster.\" >&2; exit 254"
        };

        self.stub(
            "aws",
            &format!(
                r#"echo "aws $*" >> "{log}"
case "$*" in
  "--version") echo "aws-cli/2.15.0" ;;
  "sts get-caller-identity"*) echo '{{"UserId":"AIDAEXAMPLE","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/lab"}}' ;;
  "ecr get-login-password"*) echo "tok3n" ;;
  "ecr describe-repositories"*) echo "An error occurred (RepositoryNotFoundException) when calling the DescribeRepositories operation" >&2; exit 254 ;;
  "ecr delete-repository"*) echo "An error occurred (RepositoryNotFoundException) when calling the DeleteRepository operation" >&2; exit 254 ;;
  "iam get-role"*) echo "An error occurred (NoSuchEntity) when calling the GetRole operation" >&2; exit 254 ;;
  "s3api head-bucket"*) echo "An error occurred (404) when calling the HeadBucket operation: Not Found" >&2; exit 254 ;;
  "rds describe-db-subnet-groups"*) echo "An error occurred (DBSubnetGroupNotFoundFault) when calling the DescribeDBSubnetGroups operation" >&2; exit 254 ;;
  "ec2 describe-key-pairs"*) echo "An error occurred (InvalidKeyPair.NotFound) when calling the DescribeKeyPairs operation" >&2; exit 254 ;;
  "logs describe-log-groups"*) echo '{{"logGroups":[]}}' ;;
  "eks update-kubeconfig"*) {eks} ;;
esac
exit 0
"#
            ),
        );

        self.stub(
            "terraform",
            &format!(
                r#"echo "terraform $* prefix=$TF_VAR_name_prefix" >> "{log}"
case "$*" in
  *" output -json"*) echo '{{"db_address":{{"sensitive":false,"type":"string","value":"demo-1-db.abc.us-west-2.rds.amazonaws.com"}},"bucket_url":{{"value":"https://demo-1-assets-123456789012.s3.amazonaws.com"}},"cluster_name":{{"value":"demo-1-cluster"}}}}' ;;
esac
exit 0
"#
            ),
        );

        self.stub(
            "docker",
            &format!(
                r#"echo "docker $*" >> "{log}"
case "$*" in
  "info"*) echo "24.0.7" ;;
  "login"*) while IFS= read -r _; do :; done; echo "Login Succeeded" ;;
esac
exit 0
"#
            ),
        );

        self.stub(
            "kubectl",
            &format!(
                r#"echo "kubectl $*" >> "{log}"
case "$*" in
  "apply -f -") while IFS= read -r _; do :; done; echo "deployment.apps/demo-1-webapp created" ;;
  "get deployment "*) echo '{{"metadata":{{"generation":1}},"spec":{{"replicas":2}},"status":{{"observedGeneration":1,"replicas":2,"updatedReplicas":2,"availableReplicas":2}}}}' ;;
  "get service "*) echo '{{"status":{{"loadBalancer":{{"ingress":[{{"hostname":"a1b2.elb.us-west-2.amazonaws.com"}}]}}}}}}' ;;
  "delete "*) echo 'deployment.apps "demo-1-webapp" deleted' ;;
esac
exit 0
"#
            ),
        );

        self.stub("git", &format!("echo \"git $*\" >> \"{log}\"\nexit 0\n"));

        self.stub(
            "ssh-keygen",
            &format!(
                r#"echo "ssh-keygen $*" >> "{log}"
if [ "$1" = "-?" ]; then echo "usage: ssh-keygen" >&2; exit 1; fi
key=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-f" ]; then key="$2"; fi
  shift
done
: > "$key"
echo "ssh-rsa AAAAB3NzaC1yc2E lab" > "$key.pub"
exit 0
"#
            ),
        );
    }

    /// Replace the `kubectl` stub with one whose deployment never becomes
    /// ready and whose pods are crash looping.
    #[cfg(unix)]
    pub fn install_stalled_rollout(&self) {
        let log = self.log.display().to_string();
        self.stub(
            "kubectl",
            &format!(
                r#"echo "kubectl $*" >> "{log}"
case "$*" in
  "apply -f -") while IFS= read -r _; do :; done; echo "deployment.apps/demo-1-webapp created" ;;
  "get deployment "*) echo '{{"metadata":{{"generation":1}},"spec":{{"replicas":2}},"status":{{"conditions":[{{"type":"Progressing","status":"False","reason":"ProgressDeadlineExceeded","message":"ReplicaSet has timed out progressing."}}]}}}}' ;;
  "get pods "*) echo "demo-1-webapp-5d9-x2k  0/1  CrashLoopBackOff  4  2m" ;;
  "describe "*) printf 'Environment:\n  DB_PASSWORD:  password123\nEvents: Back-off restarting failed container\n' ;;
  "logs "*) echo "PHP Fatal error: database connection refused" ;;
esac
exit 0
"#
            ),
        );
    }

    #[cfg(unix)]
    fn stub(&self, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = self.bin.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write stub");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    }
}

fn make_fixture_app(base: &Path) -> PathBuf {
    let app = base.join("dvwa");
    fs::create_dir_all(app.join(".git")).expect("create .git");
    fs::create_dir_all(app.join("config")).expect("create config dir");
    fs::write(app.join(".git/HEAD"), "ref: refs/heads/master\n").expect("write HEAD");
    fs::write(app.join("index.php"), "<?php echo 'Damn Vulnerable';\n").expect("write index");
    fs::write(app.join("config/config.inc.php"), "<?php\n").expect("write config");
    fs::write(app.join("Dockerfile"), "FROM php:8-apache\nCOPY . /var/www/html\n")
        .expect("write Dockerfile");
    app
}

pub fn load_schema(name: &str) -> Value {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let raw = fs::read_to_string(root.join("docs/contracts").join(name)).expect("read schema");
    serde_json::from_str(&raw).expect("parse schema")
}

pub fn validate(schema_name: &str, data: &Value) {
    let schema = load_schema(schema_name);
    let validator = jsonschema::JSONSchema::compile(&schema).expect("compile schema");
    let msgs: Vec<String> = match validator.validate(data) {
        Ok(()) => return,
        Err(errors) => errors.map(|e| e.to_string()).collect(),
    };
    panic!("schema validation failed: {}", msgs.join(" | "));
}

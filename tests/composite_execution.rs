//! Integration tests for composite action execution

mod common;

use actrun::config::load_action;
use actrun::error::{ActrunError, ExecutionError, LocateError};
use actrun::runner::{execute_action, ActionFetcher, Engine, FetchedAction};
use common::{context_for, create_workspace, seed_env, write_action};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

fn run(engine: &Engine, workspace: &Path, action_dir: &Path, inputs: &[(&str, &str)]) -> actrun::Result<String> {
    let (action, _) = load_action(action_dir)?;
    let mut ctx = context_for(workspace, action_dir, inputs);
    engine.execute_action(&action, &mut ctx).map(|outcome| outcome.output)
}

#[test]
fn test_with_inputs_substituted_before_delegation() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
name: parent
inputs:
  y:
    required: true
runs:
  using: composite
  steps:
    - run: echo hi
    - uses: ./child
      with:
        x: ${{ inputs.y }}
"#,
    );
    write_action(
        &parent,
        "child",
        r#"
name: child
inputs:
  x:
    description: value from the parent
runs:
  using: composite
  steps:
    - run: echo "x=$INPUT_X"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &parent, &[("y", "42")]).unwrap();
    assert_eq!(output, "hi\nx=42\n");
}

#[test]
fn test_output_file_visible_to_later_steps() {
    let ws = create_workspace();
    let dir = write_action(
        ws.path(),
        "outputs",
        r#"
runs:
  using: composite
  steps:
    - id: s1
      run: echo "x=5" >> $OUTPUT_FILE
    - id: s2
      run: |
        {
          echo "notes<<EOF"
          echo "line one"
          echo "line two"
          echo "EOF"
        } >> "$GITHUB_OUTPUT"
    - run: |
        echo "x=${{ steps.s1.outputs.x }}"
        echo "notes=${{ steps.s2.outputs.notes }}"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &dir, &[]).unwrap();
    assert_eq!(output, "x=5\nnotes=line one\nline two\n");
}

#[test]
fn test_declared_outputs_bubble_to_parent() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
runs:
  using: composite
  steps:
    - id: c
      uses: ./child
    - run: echo "v=${{ steps.c.outputs.value }} m=[${{ steps.c.outputs.missing }}]"
"#,
    );
    write_action(
        &parent,
        "child",
        r#"
outputs:
  value:
    description: produced by a step
    value: ${{ steps.inner.outputs.v }}
  missing:
    value: ${{ steps.never.outputs.z }}
runs:
  using: composite
  steps:
    - id: inner
      run: echo "::set-output name=v::7"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &parent, &[]).unwrap();
    assert!(output.ends_with("v=7 m=[]\n"), "output was {:?}", output);
}

#[test]
fn test_sibling_delegations_are_isolated() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
runs:
  using: composite
  steps:
    - uses: ./a
    - uses: ./b
"#,
    );
    write_action(
        &parent,
        "a",
        r#"
runs:
  using: composite
  steps:
    - run: echo "LEAK=1" >> "$GITHUB_ENV"
    - run: echo "a sees [$LEAK]"
"#,
    );
    write_action(
        &parent,
        "b",
        r#"
runs:
  using: composite
  steps:
    - run: echo "b sees [$LEAK]"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &parent, &[]).unwrap();
    assert_eq!(output, "a sees [1]\nb sees []\n");
}

#[test]
fn test_caller_inputs_not_inherited_by_delegation() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
inputs:
  token:
    required: true
  name:
    required: true
runs:
  using: composite
  steps:
    - uses: ./child
    - uses: ./child
      with:
        name: passed
"#,
    );
    write_action(
        &parent,
        "child",
        r#"
inputs:
  name:
    default: child-default
runs:
  using: composite
  steps:
    - run: echo "name=${{ inputs.name }} token=[$INPUT_TOKEN]"
"#,
    );

    let output = run(
        &Engine::new(),
        ws.path(),
        &parent,
        &[("token", "s3cret"), ("name", "parent-value")],
    )
    .unwrap();
    assert_eq!(output, "name=child-default token=[]\nname=passed token=[]\n");
}

#[test]
fn test_defaults_applied_for_missing_inputs() {
    let ws = create_workspace();
    let dir = write_action(
        ws.path(),
        "greet",
        r#"
inputs:
  greeting:
    default: hello
  loud:
    default: false
  who:
    required: true
runs:
  using: composite
  steps:
    - run: echo "${{ inputs.greeting }} $INPUT_WHO loud=$INPUT_LOUD"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &dir, &[("who", "world")]).unwrap();
    assert_eq!(output, "hello world loud=false\n");
}

#[test]
fn test_action_path_per_level() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
runs:
  using: composite
  steps:
    - run: echo "parent=${{ github.action_path }}"
    - uses: ./nested/child
"#,
    );
    let child = write_action(
        &parent,
        "nested/child",
        r#"
runs:
  using: composite
  steps:
    - run: echo "child=$GITHUB_ACTION_PATH"
"#,
    );

    let output = run(&Engine::new(), ws.path(), &parent, &[]).unwrap();
    assert_eq!(
        output,
        format!("parent={}\nchild={}\n", parent.display(), child.display())
    );
}

#[test]
fn test_failing_step_reports_index() {
    let ws = create_workspace();
    let dir = write_action(
        ws.path(),
        "fails",
        r#"
runs:
  using: composite
  steps:
    - run: echo first
    - name: Exit three
      run: exit 3
    - run: echo never
"#,
    );

    let err = run(&Engine::new(), ws.path(), &dir, &[]).unwrap_err();
    assert_eq!(err.step_path(), vec![2]);
    assert!(matches!(
        err.root_cause(),
        ActrunError::Execution(ExecutionError::CommandFailed { code: Some(3), .. })
    ));
}

#[test]
fn test_nested_failure_path() {
    let ws = create_workspace();
    let parent = write_action(
        ws.path(),
        "parent",
        r#"
runs:
  using: composite
  steps:
    - run: "true"
    - uses: ./child
"#,
    );
    write_action(
        &parent,
        "child",
        r#"
runs:
  using: composite
  steps:
    - run: "false"
"#,
    );

    let err = run(&Engine::new(), ws.path(), &parent, &[]).unwrap_err();
    assert_eq!(err.step_path(), vec![2, 1]);
}

#[test]
fn test_circular_delegation_detected() {
    let ws = create_workspace();
    let a = write_action(
        ws.path(),
        "a",
        r#"
runs:
  using: composite
  steps:
    - uses: ../b
"#,
    );
    write_action(
        ws.path(),
        "b",
        r#"
runs:
  using: composite
  steps:
    - uses: ../a
"#,
    );

    let err = run(&Engine::new(), ws.path(), &a, &[]).unwrap_err();
    match err.root_cause() {
        ActrunError::Execution(ExecutionError::CircularDelegation(chain)) => {
            assert!(chain.contains(" -> "));
            assert!(chain.ends_with(&a.display().to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_escaping_reference_rejected() {
    let ws = create_workspace();
    let dir = write_action(
        ws.path(),
        "a/b",
        r#"
runs:
  using: composite
  steps:
    - uses: ../../../escape
"#,
    );

    let err = run(&Engine::new(), ws.path(), &dir, &[]).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ActrunError::Locate(LocateError::PathEscapesRepository { .. })
    ));
}

/// Serves a canned composite action for every hosted reference
#[derive(Clone, Default)]
struct FakeFetcher {
    script: String,
    fetched: Rc<RefCell<Vec<(String, PathBuf)>>>,
}

impl ActionFetcher for FakeFetcher {
    fn fetch(&self, owner: &str, repo: &str, git_ref: &str) -> actrun::error::LocateResult<FetchedAction> {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("action.yml"),
            format!("runs:\n  using: composite\n  steps:\n    - run: {}\n", self.script),
        )
        .unwrap();
        self.fetched
            .borrow_mut()
            .push((format!("{}/{}@{}", owner, repo, git_ref), dir.path().to_path_buf()));
        Ok(FetchedAction::new(dir))
    }
}

fn hosted_parent(ws: &Path) -> PathBuf {
    write_action(
        ws,
        "parent",
        r#"
runs:
  using: composite
  steps:
    - uses: octo/greet@v1
    - uses: octo/greet
"#,
    )
}

#[test]
fn test_hosted_checkouts_removed_after_success() {
    let ws = create_workspace();
    let parent = hosted_parent(ws.path());
    let fetcher = FakeFetcher {
        script: "echo remote".to_string(),
        ..Default::default()
    };
    let engine = Engine::new().with_fetcher(fetcher.clone());

    let output = run(&engine, ws.path(), &parent, &[]).unwrap();
    assert_eq!(output, "remote\nremote\n");

    let fetched = fetcher.fetched.borrow();
    assert_eq!(fetched[0].0, "octo/greet@v1");
    assert_eq!(fetched[1].0, "octo/greet@main");
    assert!(fetched.iter().all(|(_, path)| !path.exists()));
}

#[test]
fn test_hosted_checkout_removed_after_failure() {
    let ws = create_workspace();
    let parent = hosted_parent(ws.path());
    let fetcher = FakeFetcher {
        script: "exit 1".to_string(),
        ..Default::default()
    };
    let engine = Engine::new().with_fetcher(fetcher.clone());

    let err = run(&engine, ws.path(), &parent, &[]).unwrap_err();
    assert_eq!(err.step_path(), vec![1, 1]);

    let fetched = fetcher.fetched.borrow();
    assert_eq!(fetched.len(), 1);
    assert!(!fetched[0].1.exists());
}

#[test]
fn test_free_function_uses_action_dir_as_root() {
    let ws = create_workspace();
    let dir = ws.path().to_path_buf();
    fs::write(
        dir.join("action.yml"),
        "runs:\n  using: composite\n  steps:\n    - uses: ./sub\n",
    )
    .unwrap();
    write_action(
        ws.path(),
        "sub",
        r#"
runs:
  using: composite
  steps:
    - run: echo "from sub"
"#,
    );
    let (action, _) = load_action(&dir).unwrap();

    let mut env = seed_env(ws.path(), &[]);
    env.remove(actrun::runner::WORKSPACE_VAR);
    let output = execute_action(&action, &dir, env).unwrap();
    assert_eq!(output, "from sub\n");
}

#[cfg(unix)]
#[test]
fn test_attestation_wraps_every_step() {
    use actrun::runner::{Attestation, ShellRunner};
    use std::os::unix::fs::PermissionsExt;

    let ws = create_workspace();
    let wrapper = ws.path().join("attest.sh");
    fs::write(
        &wrapper,
        "#!/bin/sh\necho \"attested $1\"\nwhile [ \"$1\" != \"--\" ]; do shift; done\nshift\nexec \"$@\"\n",
    )
    .unwrap();
    fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).unwrap();

    let dir = write_action(
        ws.path(),
        "wrapped",
        r#"
runs:
  using: composite
  steps:
    - run: echo one
    - run: echo two
      shell: sh
"#,
    );

    let runner = ShellRunner::new().with_attestation(Attestation {
        binary: wrapper,
        options: vec!["--policy=strict".to_string()],
    });
    let engine = Engine::new().with_executor(runner);

    let output = run(&engine, ws.path(), &dir, &[]).unwrap();
    assert_eq!(
        output,
        "attested --policy=strict\none\nattested --policy=strict\ntwo\n"
    );
}

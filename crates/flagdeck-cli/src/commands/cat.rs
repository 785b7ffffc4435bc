use clap::ArgMatches;

use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::output::Style;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture};

const MASCOT: &str = r"
        /\_/\
       ( o.o )   flags up!
        > ^ <
       /     \
      (| | | |)
       ^^   ^^
";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("cat", "Print the mascot", Affinity::ChildOf(&[]))
        .handler(run)
        .without_auth()
}

fn run<'a>(
    _args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    _cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.output().write_styled(MASCOT.trim_start_matches('\n'), Style::Cyan);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flagdeck_config::MemoryConfigProvider;

    use crate::cancel::Cancellation;
    use crate::cli::{Runtime, run_with};
    use crate::error::EXIT_OK;
    use crate::output::BufferedOutput;

    #[tokio::test]
    async fn cat_runs_without_credential() {
        let output = Arc::new(BufferedOutput::new());
        let runtime = Runtime::new(output.clone(), Arc::new(MemoryConfigProvider::default()));

        let code = run_with(["flagdeck", "cat"], &runtime, &Cancellation::never()).await;

        assert_eq!(code, EXIT_OK);
        assert!(output.stdout().contains("( o.o )"));
    }
}

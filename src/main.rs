use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use docswap::{Document, DocumentHandle, Format, Replacement, Segment, SUPPORTED_EXTENSIONS};

#[derive(Parser)]
#[command(name = "docswap")]
#[command(about = "从文档中提取可翻译文本，并把译文写回原文档")]
#[command(version)]
struct Cli {
    /// 输入文档路径（txt/xlsx/xml 等）
    #[arg(short, long)]
    input: PathBuf,

    /// 文档格式（默认根据扩展名推断）
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// 输出路径：提取模式下为 JSON 文件（默认输出到标准输出），
    /// 应用模式下为目标文档（默认 <name>_translated.<ext>）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 提取结果中包含槽位信息（text/tail 与元素名）
    #[arg(long)]
    context: bool,

    /// 应用翻译模式：从 JSON 文件读取替换列表
    #[arg(long)]
    apply: Option<PathBuf>,

    /// 应用翻译模式：从标准输入读取替换列表
    #[arg(long)]
    apply_stdin: bool,

    /// 直接覆盖输入文档
    #[arg(long)]
    in_place: bool,

    /// 覆盖前创建带时间戳的备份
    #[arg(long)]
    backup: bool,

    /// 测试模式：原样提取并写回，用于验证往返一致性
    #[arg(long)]
    test_rebuild: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    validate_options(&cli)?;
    let format = resolve_format(&cli)?;

    let mut document = Document::open(&cli.input, format)
        .with_context(|| format!("打开文档失败: {}", cli.input.display()))?;
    debug!(format = format.name(), "document opened");

    if cli.test_rebuild {
        return handle_test_rebuild(&cli, &mut document);
    }

    if cli.apply_stdin {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("从标准输入读取失败")?;
        return handle_apply(&cli, &mut document, &buffer);
    }

    if let Some(apply_file) = &cli.apply {
        let json = std::fs::read_to_string(apply_file)
            .with_context(|| format!("读取替换文件失败: {}", apply_file.display()))?;
        return handle_apply(&cli, &mut document, &json);
    }

    // 默认模式：文本提取
    handle_extraction(&cli, &document)
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 验证选项组合
fn validate_options(cli: &Cli) -> Result<()> {
    let modes = [cli.apply.is_some(), cli.apply_stdin, cli.test_rebuild]
        .iter()
        .filter(|&&x| x)
        .count();
    if modes > 1 {
        bail!("只能使用一种模式：--apply、--apply-stdin 或 --test-rebuild");
    }

    if cli.in_place && modes == 0 {
        bail!("--in-place 只能与 --apply、--apply-stdin 或 --test-rebuild 一起使用");
    }

    if cli.backup && !cli.in_place {
        bail!("--backup 需要同时使用 --in-place");
    }

    if cli.in_place && cli.output.is_some() {
        bail!("--in-place 与 --output 不能同时使用");
    }

    if !cli.input.exists() {
        bail!("输入文件不存在: {}", cli.input.display());
    }

    Ok(())
}

fn resolve_format(cli: &Cli) -> Result<Format> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    Format::from_path(&cli.input).with_context(|| {
        format!(
            "无法识别文件格式，请使用 --format 指定（支持的扩展名: {}）",
            SUPPORTED_EXTENSIONS.join(", ")
        )
    })
}

/// 处理文本提取
fn handle_extraction(cli: &Cli, document: &Document) -> Result<()> {
    let texts = document.extract();
    let count = texts.len();

    let segments = match document {
        Document::Xml(xml) if cli.context => Segment::with_locations(texts, &xml.locate()),
        _ => Segment::from_texts(texts),
    };
    let json = serde_json::to_string_pretty(&segments).context("序列化JSON失败")?;

    match &cli.output {
        Some(output) => {
            std::fs::write(output, &json)
                .with_context(|| format!("写入文件失败: {}", output.display()))?;
            info!("提取到 {} 个文本片段，结果已写入: {}", count, output.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// 处理替换应用
fn handle_apply(cli: &Cli, document: &mut Document, json: &str) -> Result<()> {
    let replacements = Replacement::parse_json(json).context("解析替换列表失败")?;
    if replacements.is_empty() {
        bail!("替换列表为空");
    }

    let applied = replacements.iter().filter(|r| r.text.is_some()).count();
    let total = replacements.len();
    let count = document.extract().len();
    let sequence = Replacement::into_sequence(replacements, count)?;

    document.swap(&sequence).context("写回译文失败")?;

    let dest = save_document(cli, document, "translated")?;
    info!(
        "应用了 {} 个替换（共 {} 条，文档有 {} 个片段），输出到: {}",
        applied,
        total,
        count,
        dest.display()
    );
    Ok(())
}

/// 处理测试重建模式
fn handle_test_rebuild(cli: &Cli, document: &mut Document) -> Result<()> {
    let texts: Vec<Option<String>> = document.extract().into_iter().map(Some).collect();
    document.swap(&texts).context("重建失败")?;

    let dest = save_document(cli, document, "rebuilt")?;
    let rebuilt = Document::open(&dest, document.format())
        .with_context(|| format!("重新打开重建文件失败: {}", dest.display()))?;

    let original = document.extract();
    if rebuilt.extract() != original {
        bail!("重建后的文本片段与原文档不一致: {}", dest.display());
    }

    info!("重建完成，{} 个文本片段一致，输出到: {}", original.len(), dest.display());
    Ok(())
}

/// 保存文档，按选项决定覆盖原文件或写入新路径
fn save_document(cli: &Cli, document: &Document, suffix: &str) -> Result<PathBuf> {
    if cli.in_place {
        if cli.backup {
            let backup = docswap::utils::create_backup(&cli.input)?;
            info!("已创建备份文件: {}", backup.display());
        }
        return document.save(None).context("保存文档失败");
    }

    let dest = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, suffix));
    document.save(Some(&dest)).context("保存文档失败")
}

/// `<stem>_<suffix>.<ext>`
fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    input.with_file_name(file_name)
}

use anyhow::Result;
use bookcraft::core::error::GenerationError;
use bookcraft::core::state::{
    BookMode, FontFamily, Image, SectionStub, Stage, TargetLength, Tone, BODY_FONT_SIZES,
};
use bookcraft::services::cover::{CoverFont, CoverStyle, TextAlign, AUTHOR_SIZE_RANGE, TITLE_SIZE_RANGE};
use bookcraft::services::workflow::{BookIdea, ContentProgress, WorkflowManager};
use bookcraft::utils::image::load_image_file;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, CustomType, InquireError, MultiSelect, Select, Text};
use std::path::{Path, PathBuf};
use std::time::Duration;

const GO_BACK: &str = "Go back";
const START_OVER: &str = "Start over";
const QUIT: &str = "Quit";

enum Flow {
    Continue,
    Quit,
}

/// Drives the wizard until the user quits.
pub async fn run(manager: &mut WorkflowManager, output_dir: &Path) -> Result<()> {
    loop {
        println!("\n== Step {} of 5: {} ==", manager.stage().number(), manager.stage());
        let step = match manager.stage() {
            Stage::Idea => idea_step(manager).await,
            Stage::Outline => outline_step(manager).await,
            Stage::Content => content_step(manager, output_dir).await,
            Stage::Cover => cover_step(manager, output_dir).await,
            Stage::Download => download_step(manager, output_dir).await,
        };

        match step {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => return Ok(()),
            Err(e) => match e.downcast_ref::<InquireError>() {
                Some(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    println!("Progress is saved. Bye!");
                    return Ok(());
                }
                _ => report(&e),
            },
        }
    }
}

fn report(error: &anyhow::Error) {
    match error.downcast_ref::<GenerationError>() {
        Some(e) => {
            log::error!("{:?}", error);
            eprintln!("{}", e.user_message());
        }
        None => eprintln!("Error: {:#}", error),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Shared tail of every stage menu. Returns `None` when the choice was not
/// a navigation entry.
async fn navigate(manager: &mut WorkflowManager, choice: &str) -> Result<Option<Flow>> {
    match choice {
        GO_BACK => {
            let earlier: Vec<Stage> = [Stage::Idea, Stage::Outline, Stage::Content, Stage::Cover]
                .into_iter()
                .filter(|s| *s < manager.stage())
                .collect();
            let target = Select::new("Return to which step?", earlier).prompt()?;
            manager.go_back(target).await?;
            Ok(Some(Flow::Continue))
        }
        START_OVER => {
            if Confirm::new("Discard the whole book and start over?")
                .with_default(false)
                .prompt()?
            {
                manager.reset().await?;
            }
            Ok(Some(Flow::Continue))
        }
        QUIT => Ok(Some(Flow::Quit)),
        _ => Ok(None),
    }
}

async fn idea_step(manager: &mut WorkflowManager) -> Result<Flow> {
    let current = BookIdea::from_project(manager.project());

    let topic = Text::new("What is the book about?")
        .with_initial_value(&current.topic)
        .prompt()?;
    let title = Text::new("Title:").with_initial_value(&current.title).prompt()?;
    let author = Text::new("Author:").with_initial_value(&current.author).prompt()?;
    let audience = Text::new("Target audience:")
        .with_initial_value(&current.audience)
        .prompt()?;

    let mode = Select::new("Book type:", vec!["Standard ebook", "Coloring book"])
        .with_starting_cursor(usize::from(current.mode == BookMode::Coloring))
        .prompt()?;
    let mode = if mode == "Coloring book" {
        BookMode::Coloring
    } else {
        BookMode::Standard
    };

    let lengths = ["Short", "Medium", "Long"];
    let length = Select::new("Length:", lengths.to_vec())
        .with_starting_cursor(current.target_length as usize)
        .prompt()?;
    let target_length = match length {
        "Short" => TargetLength::Short,
        "Long" => TargetLength::Long,
        _ => TargetLength::Medium,
    };

    let tones: Vec<&str> = Tone::ALL.iter().map(|t| t.label()).collect();
    let tone = Select::new("Tone:", tones).prompt()?;
    let tone = Tone::ALL
        .into_iter()
        .find(|t| t.label() == tone)
        .unwrap_or_default();

    let (font_family, font_size) = if mode == BookMode::Standard {
        let family = Select::new("Body font:", vec!["Serif", "Sans-serif", "Monospace"]).prompt()?;
        let family = match family {
            "Sans-serif" => FontFamily::SansSerif,
            "Monospace" => FontFamily::Monospace,
            _ => FontFamily::Serif,
        };
        let size = Select::new("Body font size (pt):", BODY_FONT_SIZES.to_vec())
            .with_starting_cursor(
                BODY_FONT_SIZES
                    .iter()
                    .position(|s| *s == current.font_size)
                    .unwrap_or(2),
            )
            .prompt()?;
        (family, size)
    } else {
        (current.font_family, current.font_size)
    };

    let pb = spinner("Drafting the outline...")?;
    let result = manager
        .submit_idea(BookIdea {
            title,
            author,
            topic,
            audience,
            tone,
            target_length,
            mode,
            font_family,
            font_size,
        })
        .await;
    pb.finish_and_clear();
    result?;
    Ok(Flow::Continue)
}

fn print_outline(stubs: &[SectionStub]) {
    for (i, stub) in stubs.iter().enumerate() {
        println!("{:>3}. {}", i + 1, stub.title);
        if !stub.description.is_empty() {
            println!("     {}", stub.description);
        }
    }
}

async fn outline_step(manager: &mut WorkflowManager) -> Result<Flow> {
    let mut edits: Vec<SectionStub> = manager
        .project()
        .sections
        .iter()
        .map(|s| SectionStub {
            title: s.title.clone(),
            description: s.description.clone(),
        })
        .collect();

    loop {
        print_outline(&edits);
        let choice = Select::new(
            "Outline:",
            vec!["Confirm and continue", "Edit an entry", GO_BACK, START_OVER, QUIT],
        )
        .prompt()?;

        match choice {
            "Edit an entry" => {
                let index = CustomType::<usize>::new("Entry number:")
                    .with_validator(bounded(edits.len()))
                    .prompt()?
                    - 1;
                let stub = &mut edits[index];
                stub.title = Text::new("Title:").with_initial_value(&stub.title).prompt()?;
                stub.description = Text::new("Description:")
                    .with_initial_value(&stub.description)
                    .prompt()?;
            }
            "Confirm and continue" => {
                let pb = ProgressBar::new(edits.len() as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
                        .progress_chars("#>-"),
                );
                let mut on_progress = |event: &ContentProgress| match event {
                    ContentProgress::Started { title, .. } => pb.set_message(title.clone()),
                    ContentProgress::Skipped { .. } | ContentProgress::Finished { .. } => pb.inc(1),
                };
                let result = manager.confirm_outline(edits, &mut on_progress).await;
                pb.finish_and_clear();
                result?;
                return Ok(Flow::Continue);
            }
            other => {
                if let Some(flow) = navigate(manager, other).await? {
                    return Ok(flow);
                }
            }
        }
    }
}

fn bounded(len: usize) -> impl Fn(&usize) -> Result<inquire::validator::Validation, inquire::CustomUserError> + Clone {
    move |n: &usize| {
        if (1..=len).contains(n) {
            Ok(inquire::validator::Validation::Valid)
        } else {
            Ok(inquire::validator::Validation::Invalid(
                format!("Pick a number between 1 and {}", len).into(),
            ))
        }
    }
}

fn extension(image: &Image) -> &'static str {
    match image.mime_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Writes candidates next to the output so they can be inspected before
/// picking.
fn write_previews(output_dir: &Path, prefix: &str, images: &[Image]) -> Result<Vec<PathBuf>> {
    let dir = output_dir.join("previews");
    std::fs::create_dir_all(&dir)?;
    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let path = dir.join(format!("{}_{}.{}", prefix, i + 1, extension(image)));
            std::fs::write(&path, &image.data)?;
            Ok(path)
        })
        .collect()
}

async fn content_step(manager: &mut WorkflowManager, output_dir: &Path) -> Result<Flow> {
    let mode = manager.project().mode;
    for (i, section) in manager.project().sections.iter().enumerate() {
        println!("{:>3}. {} ({} image(s))", i + 1, section.title, section.images.len());
    }

    let choice = Select::new(
        "Content:",
        vec!["Illustrate a section", "Upload an image", "Continue to cover", GO_BACK, START_OVER, QUIT],
    )
    .prompt()?;

    match choice {
        "Illustrate a section" => {
            let index = CustomType::<usize>::new("Section number:")
                .with_validator(bounded(manager.project().sections.len()))
                .prompt()?
                - 1;
            let count = CustomType::<u32>::new("How many candidates?")
                .with_default(if mode == BookMode::Coloring { 4 } else { 2 })
                .prompt()?;

            let pb = spinner("Generating images...")?;
            let result = manager.generate_section_images(index, count).await;
            pb.finish_and_clear();
            let candidates = result?;

            let paths = write_previews(output_dir, &format!("section_{}", index + 1), &candidates)?;
            let labels: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            let picked: Vec<usize> = match mode {
                BookMode::Coloring => MultiSelect::new("Keep which pages?", labels.clone())
                    .prompt()?
                    .iter()
                    .filter_map(|l| labels.iter().position(|x| x == l))
                    .collect(),
                BookMode::Standard => {
                    let label = Select::new("Use which illustration?", labels.clone()).prompt()?;
                    labels.iter().position(|x| *x == label).into_iter().collect()
                }
            };
            for i in picked {
                manager.select_image(index, candidates[i].clone()).await?;
            }
        }
        "Upload an image" => {
            let index = CustomType::<usize>::new("Section number:")
                .with_validator(bounded(manager.project().sections.len()))
                .prompt()?
                - 1;
            let path = Text::new("Image file path:").prompt()?;
            let image = load_image_file(Path::new(path.trim()))?;
            manager.upload_image(index, image).await?;
        }
        "Continue to cover" => manager.advance_to_cover().await?,
        other => {
            if let Some(flow) = navigate(manager, other).await? {
                return Ok(flow);
            }
        }
    }
    Ok(Flow::Continue)
}

fn cover_style(has_fonts: bool) -> Result<Option<CoverStyle>> {
    if !has_fonts {
        println!("No cover fonts configured (cover.fonts); the art is used without text.");
        return Ok(None);
    }
    if !Confirm::new("Draw the title and author on the cover?")
        .with_default(true)
        .prompt()?
    {
        return Ok(None);
    }

    let defaults = CoverStyle::default();
    let font_family = Select::new("Cover font:", CoverFont::ALL.to_vec())
        .prompt()?;
    let text_align = Select::new("Alignment:", vec![TextAlign::Right, TextAlign::Center, TextAlign::Left])
        .prompt()?;
    let text_color = Text::new("Text colour (hex):")
        .with_default(&defaults.text_color)
        .prompt()?;
    let title_font_size = CustomType::<f32>::new(&format!(
        "Title size ({}-{}):",
        TITLE_SIZE_RANGE.0, TITLE_SIZE_RANGE.1
    ))
    .with_default(defaults.title_font_size)
    .prompt()?;
    let author_font_size = CustomType::<f32>::new(&format!(
        "Author size ({}-{}):",
        AUTHOR_SIZE_RANGE.0, AUTHOR_SIZE_RANGE.1
    ))
    .with_default(defaults.author_font_size)
    .prompt()?;

    Ok(Some(CoverStyle {
        text_color,
        font_family,
        text_align,
        title_font_size,
        author_font_size,
    }))
}

const NEW_COVER: &str = "Generate cover art";
const UPLOAD_COVER: &str = "Upload cover art";
const USE_COVER: &str = "Use this cover";
const KEEP_COVER: &str = "Keep current cover";

fn cover_menu(has_current: bool, has_base: bool) -> Vec<&'static str> {
    let mut options = vec![NEW_COVER, UPLOAD_COVER];
    if has_base {
        options.push(USE_COVER);
    }
    if has_current {
        options.push(KEEP_COVER);
    }
    options.extend([GO_BACK, START_OVER, QUIT]);
    options
}

async fn cover_step(manager: &mut WorkflowManager, output_dir: &Path) -> Result<Flow> {
    // Art generated in this step survives failed submissions.
    let mut base: Option<Image> = None;
    let mut prompt = manager.project().cover_prompt.clone();

    loop {
        let options = cover_menu(manager.project().cover_image.is_some(), base.is_some());
        match Select::new("Cover:", options).prompt()? {
            NEW_COVER => {
                prompt = Text::new("Cover prompt:").with_initial_value(&prompt).prompt()?;
                let pb = spinner("Painting the cover...")?;
                let result = manager.generate_cover_art(&prompt).await;
                pb.finish_and_clear();
                let image = result?;
                let paths = write_previews(output_dir, "cover", std::slice::from_ref(&image))?;
                println!("Preview: {}", paths[0].display());
                base = Some(image);
            }
            UPLOAD_COVER => {
                let path = Text::new("Image file path:").prompt()?;
                base = Some(load_image_file(Path::new(path.trim()))?);
            }
            USE_COVER => {
                let style = match manager.project().mode {
                    BookMode::Standard => cover_style(manager.has_cover_fonts())?,
                    BookMode::Coloring => None,
                };
                match manager.submit_cover(&prompt, base.clone(), style.as_ref()).await {
                    Ok(()) => return Ok(Flow::Continue),
                    Err(e) => report(&e.into()),
                }
            }
            KEEP_COVER => {
                // The stored cover already carries its text.
                let current = manager.project().cover_image.clone();
                manager.submit_cover(&prompt, current, None).await?;
                return Ok(Flow::Continue);
            }
            other => {
                if let Some(flow) = navigate(manager, other).await? {
                    return Ok(flow);
                }
            }
        }
    }
}

async fn download_step(manager: &mut WorkflowManager, output_dir: &Path) -> Result<Flow> {
    let choice = Select::new("Your book is ready:", vec!["Download PDF", GO_BACK, START_OVER, QUIT]).prompt()?;
    if choice == "Download PDF" {
        let path = manager.download(output_dir).await?;
        println!("Saved {}", path.display());
        return Ok(Flow::Continue);
    }
    Ok(navigate(manager, choice).await?.unwrap_or(Flow::Continue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_menu_offers_stored_cover() {
        assert_eq!(
            cover_menu(false, false),
            vec![NEW_COVER, UPLOAD_COVER, GO_BACK, START_OVER, QUIT]
        );
        let menu = cover_menu(true, false);
        assert!(menu.contains(&KEEP_COVER));
        assert!(!menu.contains(&USE_COVER));
        let menu = cover_menu(true, true);
        assert!(menu.contains(&KEEP_COVER) && menu.contains(&USE_COVER));
    }
}

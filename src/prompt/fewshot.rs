//! Static command taxonomy and worked examples, one block per surface.
//!
//! The list block is a superset of the viewer block: sequences authored on
//! the study list may open a study and continue in the viewer.

pub const VIEWER_COMMANDS: &str = r#"Viewer commands:
- change_layout: Change the viewport layout. Supported layouts: "1x1", "2x1", "2x2", "3x1".
- rotate_view: Rotate the image. Fields: direction ("left" | "right"), angle (90 | 180 | 270).
- zoom_view: Zoom the image. Fields: direction ("in" | "out"), intensity (integer >= 1), dx, dy (-1..1 focus offset).
- pan_view: Move the image. Fields: dx, dy (screen pixels).
- play_cine: Start cine playback of the active series.
- stop_cine: Stop cine playback.
- download_image: Download the active viewport image.
- reset_view: Reset zoom, pan and rotation."#;

pub const SHARED_COMMANDS: &str = r#"Composite commands:
- run_sequence: Run several commands in order. Fields: steps (array of commands).
- define_macro: Save a named list of commands without running it. Fields: macroName, steps.
- perform_macro: Run a previously saved macro. Fields: macroName.
- error: Refuse the request. Fields: message."#;

pub const VIEWER_EXAMPLES: &str = r#"Instruction: "Switch to a 2 by 2 layout"
Thought: Set layout to 2x2.
{
  "command": "change_layout",
  "layout": "2x2"
}

Instruction: "Rotate the image right 90 degrees"
Thought: Issue a rotate right 90 command
{
  "command": "rotate_view",
  "direction": "right",
  "angle": 90
}

Instruction: "Zoom in 3 times toward the upper left"
Thought: Direction is in, intensity 3, upper-left corresponds to dx -1 and dy 1
{
  "command": "zoom_view",
  "direction": "in",
  "intensity": 3,
  "dx": -1,
  "dy": 1
}

Instruction: "Play the series"
Thought: Enable cine playback
{
  "command": "play_cine"
}

Instruction: "Stop playing"
Thought: Stop cine playback
{
  "command": "stop_cine"
}

Instruction: "Download the image"
Thought: Trigger download without modal
{
  "command": "download_image"
}

Instruction: "Move the image up"
Thought: Pan the image up (negative y in screen space)
{
  "command": "pan_view",
  "dx": 0,
  "dy": -50
}

Instruction: "Reset the view"
Thought: Reset zoom and pan to the default view
{
  "command": "reset_view"
}

Instruction: "Use a 2x2 layout and then rotate left 180 degrees"
Thought: Two viewer commands in order
{
  "command": "run_sequence",
  "steps": [
    { "command": "change_layout", "layout": "2x2" },
    { "command": "rotate_view", "direction": "left", "angle": 180 }
  ]
}

Instruction: "Rotate 45 degrees"
Thought: Only 90, 180 and 270 degree rotations are supported
{
  "command": "error",
  "message": "Rotation is only possible in steps of 90 degrees."
}"#;

pub const LIST_COMMANDS: &str = r#"Study list commands:
- filter: Apply filters. Fields: patientName, description, modalities (array), studyDateRange ([start, end] as YYYY-MM-DD).
- go_to_page: Change the page. Fields: pageNumber.
- sort: Sort the list. Fields: sortBy (e.g. "patientName", "studyDate", "modalities"), sortDirection ("ascending" | "descending").
- clear_filters: Remove all current filters.
- go_to_main_page: Return to the main study list.
- open_study: Open a study. Fields: studyInstanceUid.
- open_study_index: Open the study at a position on the visible page. Fields: index (1-based).
- show_version: Show app version info.
- open_upload: Open the DICOM file upload dialog.
- delete_exam: Request deletion of a study. Fields: studyInstanceUid."#;

pub const LIST_EXAMPLES: &str = r#"Instruction: "Filter the list to only show brain MRI scans"
Thought: Brain MRI means modality is MR, and 'brain' is likely in description.
{
  "command": "filter",
  "modalities": ["MR"],
  "description": "brain"
}

Instruction: "Show me studies of Kim Minji"
Thought: Filter patientName field to "Kim Minji"
{
  "command": "filter",
  "patientName": "Kim Minji"
}

Instruction: "Only show CT scans from last week"
Thought: CT is the modality, and last week's date range is needed.
{
  "command": "filter",
  "modalities": ["CT"],
  "studyDateRange": ["2025-04-08", "2025-04-15"]
}

Instruction: "Go to page 3"
Thought: This is a pagination request
{
  "command": "go_to_page",
  "pageNumber": 3
}

Instruction: "Sort the results by date descending"
Thought: Sort by studyDate in descending order
{
  "command": "sort",
  "sortBy": "studyDate",
  "sortDirection": "descending"
}

Instruction: "Clear all filters"
Thought: Reset all filtering values
{
  "command": "clear_filters"
}

Instruction: "Open the study for Neptune"
Thought: Patient name is 'Neptune'. Use the Context block to find the UID.
{
  "command": "open_study",
  "studyInstanceUid": "1.3.6.1.4.1.25403.345050719074.3824.20170125095438.5"
}

Instruction: "Open the second study"
Thought: Positional reference into the visible list
{
  "command": "open_study_index",
  "index": 2
}

Instruction: "What's the version?"
Thought: User is asking for version information
{
  "command": "show_version"
}

Instruction: "Upload a DICOM file"
Thought: Open the upload UI
{
  "command": "open_upload"
}

Instruction: "go to page 3, then filter by patient Kim, then sort by date descending"
Thought: Three list commands, executed in the given order
{
  "command": "run_sequence",
  "steps": [
    { "command": "go_to_page", "pageNumber": 3 },
    { "command": "filter", "patientName": "Kim" },
    { "command": "sort", "sortBy": "studyDate", "sortDirection": "descending" }
  ]
}

Instruction: "Open Horse's study and switch to a 2x2 layout"
Thought: Open the study first, the layout change runs in the viewer afterwards
{
  "command": "run_sequence",
  "steps": [
    { "command": "open_study", "studyInstanceUid": "2.25.96975534054447904995905761963464388233" },
    { "command": "change_layout", "layout": "2x2" }
  ]
}

Instruction: "Save a macro called morning: show only CT scans sorted by date"
Thought: Define the macro without running it
{
  "command": "define_macro",
  "macroName": "morning",
  "steps": [
    { "command": "filter", "modalities": ["CT"] },
    { "command": "sort", "sortBy": "studyDate", "sortDirection": "descending" }
  ]
}

Instruction: "Run the morning macro"
Thought: Perform the saved macro by name
{
  "command": "perform_macro",
  "macroName": "morning"
}"#;

pub const LIST_PREAMBLE: &str = "You are a helpful PACS assistant in a medical study list viewer. Convert user instructions into structured JSON commands. Supported commands include:";

pub const VIEWER_PREAMBLE: &str = "You are a helpful assistant inside a medical image viewer. Convert user instructions into structured JSON commands. Supported commands include:";

pub const RESPONSE_RULES: &str = r#"If multiple patientName/UID pairs are provided in Context, choose the one most similar to the user's input (spelling/pronunciation).

Respond ONLY with a single JSON object of the form { "command": ..., other_fields... }. Never wrap several commands in an array; use run_sequence instead."#;
